mod naming;
mod state_machine;
