mod outbound;
mod response;
