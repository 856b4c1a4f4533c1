pub mod quote;
pub mod swap;

pub use quote::QuoteClient;
pub use swap::SwapBuildClient;
