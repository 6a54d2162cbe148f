pub mod attachments;
pub mod criteria;
pub mod decoders;
pub mod fetcher;
pub mod parser;
pub mod session;
