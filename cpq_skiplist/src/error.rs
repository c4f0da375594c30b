quick_error! {
    #[derive(Debug, PartialEq, Eq)]
    pub enum QueueError {
        InvalidConfig(field: &'static str, value: usize) {
            display("invalid queue configuration: {} = {}", field, value)
        }
        EmptyQueue {
            display("queue is empty")
        }
    }
}
pub type Result<T> = std::result::Result<T, QueueError>;
