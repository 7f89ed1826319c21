use crate::domain::CommandKind;

/// Callback into the host application.
///
/// Called once per matched command the host acts on (navigation,
/// opening the booking flow). `Help` is answered by the engine itself and
/// never reaches the host.
pub trait CommandSink: Send + Sync {
    fn on_command(&self, command: CommandKind);
}

impl<F> CommandSink for F
where
    F: Fn(CommandKind) + Send + Sync,
{
    fn on_command(&self, command: CommandKind) {
        self(command)
    }
}
