// Keyspace layout for a named board
//
// Per board name B, four namespaces: job records under B, schedule index
// under B:schedule, queue FIFOs under B:queue:<runner>, runner registry
// under B:runners.

/// Key names for one board's persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardKeys {
    /// Hash of job records, field = job id, value = JSON record.
    pub board: String,
    /// Sorted set of pending due-occurrences, member = job id, score = due_at.
    pub schedule: String,
    /// Prefix for per-runner FIFO lists.
    pub queue: String,
    /// Hash mapping runner name to handler identifier.
    pub registry: String,
}

impl BoardKeys {
    pub fn new(name: &str) -> Self {
        Self {
            board: name.to_string(),
            schedule: format!("{}:schedule", name),
            queue: format!("{}:queue", name),
            registry: format!("{}:runners", name),
        }
    }

    /// Key of the FIFO list for one runner's queue.
    pub fn queue_key(&self, runner: &str) -> String {
        format!("{}:{}", self.queue, runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyspace_layout() {
        let keys = BoardKeys::new("jobs");
        assert_eq!(keys.board, "jobs");
        assert_eq!(keys.schedule, "jobs:schedule");
        assert_eq!(keys.queue, "jobs:queue");
        assert_eq!(keys.registry, "jobs:runners");
        assert_eq!(keys.queue_key("mailer"), "jobs:queue:mailer");
    }
}
