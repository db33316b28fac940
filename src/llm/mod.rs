pub mod everart;
pub mod langflow;
pub mod vision;

pub use everart::{EverArtClient, ImageOptions};
pub use langflow::{LangflowClient, LangflowError};
pub use vision::VisionClient;
