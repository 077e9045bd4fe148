mod launch;
pub mod runner;
mod sum;
