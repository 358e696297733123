pub mod launcher;

pub use launcher::JobLauncher;
