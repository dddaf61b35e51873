mod client;
mod helpers;
mod supervisor;
