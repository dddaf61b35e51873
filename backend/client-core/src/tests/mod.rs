mod client;
mod error;
mod supervisor;
mod sync;
