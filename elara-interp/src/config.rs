/// Knobs for one interpreter instance and its parse pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Receiver name inside `extend T { .. }` when no `as` alias is given.
    pub extension_alias: String,
    pub max_call_depth: usize,
    /// Native stack of the thread statements are evaluated on. Zero runs
    /// them on the calling thread.
    pub eval_stack_size: usize,
    pub token_queue: usize,
    pub statement_queue: usize,
    /// Recycled table sets kept by the context pool.
    pub pool_retain: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            extension_alias: "this".to_string(),
            max_call_depth: 256,
            eval_stack_size: 256 * 1024 * 1024,
            token_queue: 256,
            statement_queue: 16,
            pool_retain: 256,
        }
    }
}

impl InterpreterConfig {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_eval_stack_size(mut self, bytes: usize) -> Self {
        self.eval_stack_size = bytes;
        self
    }
}
