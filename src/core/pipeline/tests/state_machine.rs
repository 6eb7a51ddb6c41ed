use crate::core::pipeline::can_transition;
use crate::core::pipeline::types::RunState;

#[test]
fn happy_path_transitions_are_allowed() {
    let path = [
        (RunState::Pending, RunState::IdeaGenerated),
        (RunState::IdeaGenerated, RunState::ScriptWritten),
        (RunState::ScriptWritten, RunState::NarrationDone),
        (RunState::NarrationDone, RunState::MediaCollected),
        (RunState::MediaCollected, RunState::VideoComposed),
        (RunState::VideoComposed, RunState::Published),
    ];
    for (from, to) in path {
        assert!(
            can_transition(from, to),
            "expected transition {:?} -> {:?} to be allowed",
            from,
            to
        );
    }
}

#[test]
fn every_stage_state_can_fail_the_run() {
    let stages = [
        RunState::Pending,
        RunState::IdeaGenerated,
        RunState::ScriptWritten,
        RunState::NarrationDone,
        RunState::MediaCollected,
    ];
    for from in stages {
        assert!(
            can_transition(from, RunState::RunFailed),
            "expected {:?} -> RunFailed",
            from
        );
    }
}

#[test]
fn composed_video_can_only_resolve_distribution() {
    assert!(can_transition(
        RunState::VideoComposed,
        RunState::Published
    ));
    assert!(can_transition(
        RunState::VideoComposed,
        RunState::PublishFailed
    ));
    // Once the video exists the run itself cannot fail anymore.
    assert!(!can_transition(RunState::VideoComposed, RunState::RunFailed));
}

#[test]
fn stages_cannot_be_skipped() {
    assert!(!can_transition(RunState::Pending, RunState::ScriptWritten));
    assert!(!can_transition(
        RunState::IdeaGenerated,
        RunState::VideoComposed
    ));
    assert!(!can_transition(RunState::ScriptWritten, RunState::Published));
}

#[test]
fn terminal_states_do_not_move() {
    let terminal = [
        RunState::Published,
        RunState::PublishFailed,
        RunState::RunFailed,
    ];
    for from in terminal {
        assert!(from.is_terminal());
        for to in [
            RunState::Pending,
            RunState::IdeaGenerated,
            RunState::Published,
            RunState::RunFailed,
        ] {
            if from != to {
                assert!(!can_transition(from, to), "unexpected {:?} -> {:?}", from, to);
            }
        }
    }
}
