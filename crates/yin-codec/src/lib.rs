//! # yin-codec
//!
//! Yin 音频管线解码器库, 提供解码器框架、Packet/PcmFrame 抽象以及定点
//! MPEG-1/2/2.5 Layer III 解码器.
//!
//! ## 使用示例
//!
//! ```rust
//! use yin_codec::{CodecId, CodecRegistry};
//!
//! let mut reg = CodecRegistry::new();
//! yin_codec::register_all(&mut reg);
//!
//! let decoder = reg.create_decoder(CodecId::Mp3).unwrap();
//! assert_eq!(decoder.name(), "mp3");
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::CodecParameters;
pub use decoder::Decoder;
pub use decoders::mp3::{DecodedFrame, Mp3Decoder, Mp3Header};
pub use frame::{PcmFrame, PcmSamples};
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
}
