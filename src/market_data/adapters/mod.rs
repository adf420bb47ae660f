pub mod bitcoincharts;

pub use bitcoincharts::BitcoinchartsAdapter;
