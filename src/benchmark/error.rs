use cpq_skiplist::QueueError;

quick_error! {
    #[derive(Debug)]
    pub enum BenchmarkError {
        InvalidArgument(name: &'static str, value: String) {
            display("invalid value for {}: {}", name, value)
        }
        ParseInt(err: std::num::ParseIntError) {
            from()
            display("{}", err)
        }
        Queue(err: QueueError) {
            from()
            display("{}", err)
        }
        WorkerPanicked {
            display("a benchmark worker panicked")
        }
    }
}
pub type Result<T> = std::result::Result<T, BenchmarkError>;
