#[derive(Debug, Clone, Default)]
pub enum BarColor {
    /// Sorting raw blocks.
    #[default]
    CYAN,
    /// Writing the final drain.
    MAGENTA,
    /// Worker failed.
    RED,
}

/// Progress report sent from a worker thread to the display.
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            color,
        }
    }
}
