pub mod assembler;
pub mod compression;
pub mod validator;

pub use assembler::{AssemblyError, BlockEncoder, JpegDataUrlEncoder, RequestAssembler};
pub use compression::{CompressedImage, ImageCompressor};
pub use validator::{
    encoded_size, ImageOutcome, IntakeValidator, SizeLimit, ValidationError, ValidationReport,
};
