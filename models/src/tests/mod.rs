mod endpoint;
mod message;
