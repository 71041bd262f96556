pub mod checker;
pub mod config;
pub mod http_probe;
pub mod importer;
pub mod job;
pub mod output;
pub mod output_print;
pub mod plugin;

#[cfg(test)]
mod test_server;
