// Simulation engine entrypoint
pub mod accuracy;  // confusion counters and global/windowed accuracy
pub mod ledger;    // FIFO inventory of simulated buy positions
pub mod simulator; // sell-decision evaluation + per-step driver loop
pub mod types;
