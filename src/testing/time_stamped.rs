use std::fmt;

/// A sequential operation: takes the current sequential state and the argument of the call, and
/// returns the next state along with the result the call should have produced.
pub type SequentialOp<Seq, Ret> = fn(&Seq, Option<Ret>) -> (Seq, Option<Ret>);

/// One completed call on the concurrent object, bracketed by two ticks of the shared clock.
/// A call precedes another in real time when its `returned` tick is below the other's `invoked`.
pub struct TimeStamped<Seq, Ret> {
    pub thread: usize,
    pub message: String,
    pub invoked: usize,
    pub returned: usize,
    pub op: SequentialOp<Seq, Ret>,
    pub arg: Option<Ret>,
    pub result: Option<Ret>,
}

impl<Seq, Ret: fmt::Debug> fmt::Debug for TimeStamped<Seq, Ret> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[thread {}] {} @ {}..{} -> {:?}",
            self.thread, self.message, self.invoked, self.returned, self.result
        )
    }
}
