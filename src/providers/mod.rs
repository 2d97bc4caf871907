pub mod mistral;

pub use mistral::MistralProvider;
