//! End-to-end tests for the workflow driver.
//!
//! Callbacks are `MockCallback`s or plain closures, so every test runs
//! fully in process.

use std::sync::Arc;

use nodes::mock::{MockBehaviour, MockCallback};
use nodes::CallbackOutcome;
use serde_json::json;

use crate::specs::{Function, Simple, SubWorkflow, WaitForTrigger};
use crate::{
    Assign, EngineConfig, EngineError, SpecId, TaskId, TaskState, Workflow, WorkflowSpec,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `Start → names[0] → … → names[n-1]`, all `Simple`.
fn linear(name: &str, names: &[&str]) -> WorkflowSpec {
    let mut spec = WorkflowSpec::new(name);
    let mut chain = vec![spec.start()];
    for task in names {
        chain.push(spec.add(*task, Simple).unwrap());
    }
    spec.chain(&chain).unwrap();
    spec
}

/// `Start → A → End` where `A` embeds `nested`.
fn host_with(nested: WorkflowSpec) -> WorkflowSpec {
    let mut spec = WorkflowSpec::new("host");
    let a = spec.add("A", SubWorkflow::new(nested)).unwrap();
    let end = spec.add("End", Simple).unwrap();
    spec.chain(&[spec.start(), a, end]).unwrap();
    spec
}

fn mocked(mock: &Arc<MockCallback>) -> Function {
    Function::new(mock.name.clone(), mock.clone(), Vec::new())
}

/// `Start → f`, with `f` backed by `function`.
fn single_leaf(function: impl crate::TaskSpec + 'static) -> WorkflowSpec {
    let mut spec = WorkflowSpec::new("leaf");
    let f = spec.add("f", function).unwrap();
    spec.chain(&[spec.start(), f]).unwrap();
    spec
}

fn only(workflow: &Workflow, name: &str) -> TaskId {
    let found = workflow.tasks_named(name);
    assert_eq!(found.len(), 1, "expected exactly one '{name}' task");
    found[0]
}

fn start_of(workflow: &Workflow) -> TaskId {
    workflow.task(workflow.root()).unwrap().children()[0]
}

fn state_of(workflow: &Workflow, name: &str) -> TaskState {
    workflow.task(only(workflow, name)).unwrap().state()
}

fn spec_of(workflow: &Workflow, task: TaskId) -> SpecId {
    workflow.task(task).unwrap().spec()
}

fn names(workflow: &Workflow) -> Vec<String> {
    workflow
        .tasks()
        .map(|task| workflow.task_name(task.id()).unwrap().to_owned())
        .collect()
}

// ============================================================
// Construction and prediction
// ============================================================

#[test]
fn new_workflow_readies_start_and_predicts_the_rest() {
    let workflow = Workflow::new(&linear("plain", &["a", "b"])).unwrap();

    assert_eq!(names(&workflow), vec!["Root", "Start", "a", "b"]);
    assert_eq!(workflow.task(workflow.root()).unwrap().state(), TaskState::Completed);
    assert_eq!(state_of(&workflow, "Start"), TaskState::Ready);
    assert_eq!(state_of(&workflow, "a"), TaskState::Future);
    assert_eq!(state_of(&workflow, "b"), TaskState::Future);
    assert!(!workflow.is_completed());
}

#[test]
fn predicting_twice_changes_nothing() {
    // Start → a → (b, c), b → d
    let mut spec = WorkflowSpec::new("fan");
    let a = spec.add("a", Simple).unwrap();
    let b = spec.add("b", Simple).unwrap();
    let c = spec.add("c", Simple).unwrap();
    let d = spec.add("d", Simple).unwrap();
    spec.chain(&[spec.start(), a, b, d]).unwrap();
    spec.connect(a, c).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    let start = start_of(&workflow);

    workflow.predict(start).unwrap();
    let once = workflow.snapshot().unwrap();
    workflow.predict(start).unwrap();
    let twice = workflow.snapshot().unwrap();

    assert_eq!(once, twice);
    assert_eq!(names(&workflow), vec!["Root", "Start", "a", "b", "d", "c"]);
}

#[test]
fn completing_a_task_readies_its_children() {
    let mut workflow = Workflow::new(&linear("plain", &["a", "b"])).unwrap();
    let start = start_of(&workflow);

    assert!(workflow.complete_task(start).unwrap());
    assert_eq!(state_of(&workflow, "Start"), TaskState::Completed);
    assert_eq!(state_of(&workflow, "a"), TaskState::Ready);
    assert_eq!(state_of(&workflow, "b"), TaskState::Future);
}

#[test]
fn completing_a_future_task_is_rejected() {
    let mut workflow = Workflow::new(&linear("plain", &["a"])).unwrap();
    let a = only(&workflow, "a");
    assert!(matches!(
        workflow.complete_task(a),
        Err(EngineError::TaskNotReady { state: TaskState::Future, .. })
    ));
}

#[test]
fn finished_tasks_reject_state_changes() {
    let mut workflow = Workflow::new(&linear("plain", &["a"])).unwrap();
    let start = start_of(&workflow);
    workflow.complete_task(start).unwrap();

    let err = workflow.set_task_state(start, TaskState::Ready).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert!(err.is_structural());
}

#[test]
fn complete_all_runs_a_linear_workflow_to_the_end() {
    let mut workflow = Workflow::new(&linear("plain", &["a", "b", "c"])).unwrap();

    let report = workflow.complete_all().unwrap();

    assert!(workflow.is_completed());
    assert_eq!(report.completed.len(), 4);
    assert!(report.pending.is_empty());
    assert!(report.failed.is_empty());
}

#[test]
fn complete_next_completes_one_task_at_a_time() {
    let mut workflow = Workflow::new(&linear("plain", &["a"])).unwrap();
    assert!(workflow.complete_next().unwrap());
    assert_eq!(state_of(&workflow, "a"), TaskState::Ready);
    assert!(workflow.complete_next().unwrap());
    assert!(!workflow.complete_next().unwrap());
    assert!(workflow.is_completed());
}

#[test]
fn data_flows_from_parent_to_child() {
    let mut spec = WorkflowSpec::new("data");
    let set = spec
        .add(
            "set",
            Function::from_fn(
                "set_data",
                nodes::builtin::set_data,
                vec![json!("colour"), json!("blue")],
            ),
        )
        .unwrap();
    let after = spec.add("after", Simple).unwrap();
    spec.chain(&[spec.start(), set, after]).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    workflow.complete_all().unwrap();

    let after = workflow.task(only(&workflow, "after")).unwrap();
    assert_eq!(after.get_data("colour"), Some(&json!("blue")));
}

// ============================================================
// Callback tasks
// ============================================================

#[test]
fn function_compares_its_argument() {
    let is_42 = Function::from_fn(
        "is_42",
        |args, _task| CallbackOutcome::from(args.first() == Some(&json!(42))),
        vec![json!(42)],
    );
    let mut workflow = Workflow::new(&single_leaf(is_42)).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();

    assert!(workflow.complete_task(only(&workflow, "f")).unwrap());
    assert_eq!(state_of(&workflow, "f"), TaskState::Completed);
}

#[test]
fn done_callback_completes_the_task() {
    let mock = Arc::new(MockCallback::done("ok"));
    let mut workflow = Workflow::new(&single_leaf(mocked(&mock))).unwrap();
    workflow.complete_all().unwrap();

    assert_eq!(state_of(&workflow, "f"), TaskState::Completed);
    assert_eq!(mock.call_count(), 1);
    assert_eq!(mock.calls()[0].task_name, "f");
}

#[test]
fn retrying_callback_leaves_the_task_incomplete() {
    let mock = Arc::new(MockCallback::retrying("later"));
    let mut workflow = Workflow::new(&single_leaf(mocked(&mock))).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();
    let f = only(&workflow, "f");

    assert!(!workflow.complete_task(f).unwrap());
    assert_eq!(state_of(&workflow, "f"), TaskState::Incomplete);
    assert!(!workflow.complete_task(f).unwrap());
    assert_eq!(mock.call_count(), 2);
}

#[test]
fn incomplete_task_completes_on_a_later_drive() {
    let mock = Arc::new(MockCallback::new("slow", MockBehaviour::DoneAfter(2)));
    let mut workflow = Workflow::new(&single_leaf(mocked(&mock))).unwrap();

    let first = workflow.complete_all().unwrap();
    assert_eq!(first.pending, vec![only(&workflow, "f")]);
    assert_eq!(state_of(&workflow, "f"), TaskState::Incomplete);

    workflow.complete_all().unwrap();
    assert!(workflow.is_completed());
    assert_eq!(mock.call_count(), 2);
}

#[test]
fn failing_callback_aborts_by_default() {
    let mock = Arc::new(MockCallback::failing("bad", "disk on fire"));
    let mut workflow = Workflow::new(&single_leaf(mocked(&mock))).unwrap();

    let err = workflow.complete_all().unwrap_err();
    match &err {
        EngineError::TaskFailed { task, detail } => {
            assert_eq!(task, "f");
            assert!(detail.contains("disk on fire"), "detail: {detail}");
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert!(!err.is_structural());

    let f = workflow.task(only(&workflow, "f")).unwrap();
    assert_eq!(f.state(), TaskState::Failed);
    assert!(!f.failure().unwrap_or_default().is_empty());
}

#[test]
fn failed_task_is_never_invoked_again() {
    let mock = Arc::new(MockCallback::failing("bad", "nope"));
    let config = EngineConfig {
        abort_on_failure: false,
        ..EngineConfig::default()
    };
    let mut workflow = Workflow::with_config(&single_leaf(mocked(&mock)), config).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();
    let f = only(&workflow, "f");

    assert!(!workflow.complete_task(f).unwrap());
    assert_eq!(state_of(&workflow, "f"), TaskState::Failed);
    assert_eq!(mock.call_count(), 1);

    assert!(!workflow.complete_task(f).unwrap());
    assert_eq!(state_of(&workflow, "f"), TaskState::Failed);
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn keep_going_reports_failures_and_finishes_siblings() {
    let bad = Arc::new(MockCallback::failing("bad", "nope"));
    let good = Arc::new(MockCallback::done("good"));
    let mut spec = WorkflowSpec::new("siblings");
    let b = spec.add("bad", mocked(&bad)).unwrap();
    let g = spec.add("good", mocked(&good)).unwrap();
    spec.connect(spec.start(), b).unwrap();
    spec.connect(spec.start(), g).unwrap();

    let config = EngineConfig {
        abort_on_failure: false,
        ..EngineConfig::default()
    };
    let mut workflow = Workflow::with_config(&spec, config).unwrap();
    let report = workflow.complete_all().unwrap();

    assert_eq!(report.failed, vec![only(&workflow, "bad")]);
    assert!(report.completed.contains(&only(&workflow, "good")));
    assert_eq!(state_of(&workflow, "good"), TaskState::Completed);
    assert!(workflow.is_completed());
}

#[test]
fn untriggered_gate_stays_incomplete() {
    let mock = Arc::new(MockCallback::done("gate"));
    let gate = WaitForTrigger::new(mocked(&mock));
    let mut workflow = Workflow::new(&single_leaf(gate)).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();
    let f = only(&workflow, "f");

    for _ in 0..3 {
        assert!(!workflow.complete_task(f).unwrap());
        assert_eq!(state_of(&workflow, "f"), TaskState::Incomplete);
    }
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn triggered_gate_calls_back_once_per_attempt() {
    let mock = Arc::new(MockCallback::new("gate", MockBehaviour::DoneAfter(2)));
    let gate = WaitForTrigger::new(mocked(&mock));
    let mut workflow = Workflow::new(&single_leaf(gate)).unwrap();
    workflow.complete_all().unwrap();
    let f = only(&workflow, "f");
    assert_eq!(mock.call_count(), 0);

    let uuid = workflow.task(f).unwrap().uuid();
    workflow.trigger_by_uuid(uuid).unwrap();
    assert!(workflow.task(f).unwrap().is_triggered());

    assert!(!workflow.complete_task(f).unwrap());
    assert_eq!(mock.call_count(), 1);
    assert!(workflow.complete_task(f).unwrap());
    assert_eq!(mock.call_count(), 2);
    assert!(mock.calls().iter().all(|call| call.triggered));
    assert!(workflow.is_completed());
}

#[test]
fn trigger_before_the_gate_is_ready_is_kept() {
    let mock = Arc::new(MockCallback::done("gate"));
    let mut spec = WorkflowSpec::new("early");
    let a = spec.add("a", Simple).unwrap();
    let gate = spec.add("gate", WaitForTrigger::new(mocked(&mock))).unwrap();
    spec.chain(&[spec.start(), a, gate]).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    let gate = only(&workflow, "gate");
    assert_eq!(workflow.task(gate).unwrap().state(), TaskState::Future);
    workflow.trigger(gate).unwrap();

    workflow.complete_all().unwrap();

    assert_eq!(names(&workflow), vec!["Root", "Start", "a", "gate"]);
    assert_eq!(only(&workflow, "gate"), gate);
    assert_eq!(mock.call_count(), 1);
    assert!(workflow.is_completed());
}

#[test]
fn trigger_for_unknown_uuid_is_reported() {
    let mut workflow = Workflow::new(&linear("plain", &["a"])).unwrap();
    let stranger = uuid::Uuid::new_v4();
    assert!(matches!(
        workflow.trigger_by_uuid(stranger),
        Err(EngineError::TaskNotFound(id)) if id == stranger
    ));
}

// ============================================================
// Sub-workflows
// ============================================================

#[test]
fn linear_sub_workflow_replaces_its_host_task() {
    let mut workflow = Workflow::new(&host_with(linear("xyz", &["X", "Y", "Z"]))).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();

    // Host A and the nested Start stay in the path as pass-through tasks.
    assert_eq!(
        names(&workflow),
        vec!["Root", "Start", "A", "Start", "X", "Y", "Z", "End"]
    );

    let z = only(&workflow, "Z");
    let end = only(&workflow, "End");
    assert_eq!(workflow.task(end).unwrap().parent(), Some(z));

    let graph = workflow.graph();
    let end_spec = spec_of(&workflow, end);
    let z_spec = spec_of(&workflow, z);
    assert_eq!(graph.node(end_spec).unwrap().inputs(), &[z_spec]);
    assert_eq!(graph.node(z_spec).unwrap().outputs(), &[end_spec]);

    let a_spec = spec_of(&workflow, only(&workflow, "A"));
    assert!(!graph.node(a_spec).unwrap().outputs().contains(&end_spec));
    assert!(graph.is_spliced(a_spec));

    workflow.complete_all().unwrap();
    assert!(workflow.is_completed());
}

#[test]
fn splice_keeps_every_edge_mutual() {
    let mut workflow = Workflow::new(&host_with(linear("xyz", &["X", "Y", "Z"]))).unwrap();
    workflow.graph().check_mutual_edges().unwrap();

    workflow.complete_task(start_of(&workflow)).unwrap();
    workflow.graph().check_mutual_edges().unwrap();
    crate::validate_spec_graph(workflow.graph()).unwrap();

    workflow.complete_all().unwrap();
    workflow.graph().check_mutual_edges().unwrap();
}

#[test]
fn splice_point_leads_only_to_the_tail() {
    let mut workflow = Workflow::new(&host_with(linear("xyz", &["X", "Y", "Z"]))).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();

    let a = only(&workflow, "A");
    let end_spec = spec_of(&workflow, only(&workflow, "End"));
    let nested = workflow.task(a).unwrap().nested().cloned().unwrap();
    assert_eq!(nested.spec_name, "xyz");
    assert_eq!(nested.outer, workflow.id());
    assert_eq!(nested.tail, only(&workflow, "Z"));

    // Leaves below the splice point, with the host's own successors cut off.
    let nested_leaves: Vec<TaskId> = workflow
        .tree()
        .iter_from(a)
        .filter(|task| task.spec() != end_spec)
        .filter(|task| {
            task.children()
                .iter()
                .all(|child| spec_of(&workflow, *child) == end_spec)
        })
        .map(|task| task.id())
        .collect();
    assert_eq!(nested_leaves, vec![nested.tail]);
    assert_eq!(
        workflow.task(only(&workflow, "End")).unwrap().parent(),
        Some(nested.tail)
    );

    let entry_specs: Vec<SpecId> = nested
        .entry
        .iter()
        .map(|task| spec_of(&workflow, *task))
        .collect();
    let a_spec = spec_of(&workflow, a);
    assert_eq!(workflow.graph().node(a_spec).unwrap().outputs(), entry_specs.as_slice());
    assert_eq!(workflow.task(a).unwrap().children(), nested.entry.as_slice());
}

#[test]
fn branching_sub_workflow_is_rejected_without_touching_the_host() {
    // Nested: Start → X → (Y1, Y2)
    let mut nested = WorkflowSpec::new("forked");
    let x = nested.add("X", Simple).unwrap();
    let y1 = nested.add("Y1", Simple).unwrap();
    let y2 = nested.add("Y2", Simple).unwrap();
    nested.chain(&[nested.start(), x, y1]).unwrap();
    nested.connect(x, y2).unwrap();

    let mut workflow = Workflow::new(&host_with(nested)).unwrap();
    let a = only(&workflow, "A");
    let before = workflow.snapshot_from(a).unwrap();
    let specs_before = workflow.graph().len();
    let tasks_before = workflow.tree().len();

    let err = workflow.complete_task(start_of(&workflow)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::AmbiguousConvergence { tails: 2, .. }
    ));
    assert!(err.is_structural());
    assert!(err.to_string().contains("ambiguous convergence"));

    assert_eq!(workflow.snapshot_from(a).unwrap(), before);
    assert_eq!(workflow.graph().len(), specs_before);
    assert_eq!(workflow.tree().len(), tasks_before);
    assert_eq!(state_of(&workflow, "A"), TaskState::Future);
    assert!(workflow.task(a).unwrap().nested().is_none());
    workflow.graph().check_mutual_edges().unwrap();
}

#[test]
fn in_assign_copies_data_into_the_nested_workflow() {
    let mut nested = WorkflowSpec::new("inner");
    let check = nested
        .add(
            "check",
            Function::from_fn("equals", nodes::builtin::equals, vec![json!("hello"), json!("copied")]),
        )
        .unwrap();
    nested.connect(nested.start(), check).unwrap();

    let mut spec = WorkflowSpec::new("host");
    let set = spec
        .add(
            "set",
            Function::from_fn(
                "set_data",
                nodes::builtin::set_data,
                vec![json!("greeting"), json!("hello")],
            ),
        )
        .unwrap();
    let embed = spec
        .add(
            "embed",
            SubWorkflow::new(nested).with_in_assign(vec![
                Assign::copy("copied", "greeting"),
                Assign::value("depth", 1),
            ]),
        )
        .unwrap();
    let end = spec.add("End", Simple).unwrap();
    spec.chain(&[spec.start(), set, embed, end]).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    workflow.complete_all().unwrap();

    assert!(workflow.is_completed());
    let end = workflow.task(only(&workflow, "End")).unwrap();
    assert_eq!(end.get_data("copied"), Some(&json!("hello")));
    assert_eq!(end.get_data("depth"), Some(&json!(1)));
}

#[test]
fn tail_splits_into_every_host_output_in_declared_order() {
    // Start → A → (E1, E2), A embeds Start → X → Z
    let mut spec = WorkflowSpec::new("split");
    let a = spec.add("A", SubWorkflow::new(linear("xz", &["X", "Z"]))).unwrap();
    let e1 = spec.add("E1", Simple).unwrap();
    let e2 = spec.add("E2", Simple).unwrap();
    spec.chain(&[spec.start(), a, e1]).unwrap();
    spec.connect(a, e2).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    workflow.complete_task(start_of(&workflow)).unwrap();

    assert_eq!(
        names(&workflow),
        vec!["Root", "Start", "A", "Start", "X", "Z", "E1", "E2"]
    );
    let z = only(&workflow, "Z");
    let (e1, e2) = (only(&workflow, "E1"), only(&workflow, "E2"));
    assert_eq!(workflow.task(z).unwrap().children(), &[e1, e2]);

    let graph = workflow.graph();
    let z_spec = spec_of(&workflow, z);
    let outputs = [spec_of(&workflow, e1), spec_of(&workflow, e2)];
    assert_eq!(graph.node(z_spec).unwrap().outputs(), &outputs);
    for output in outputs {
        assert_eq!(graph.node(output).unwrap().inputs(), &[z_spec]);
    }
    graph.check_mutual_edges().unwrap();

    let report = workflow.complete_all().unwrap();
    assert!(report.completed.ends_with(&[e1, e2]));
    assert!(workflow.is_completed());
}

#[test]
fn sub_workflow_inside_a_spliced_sub_workflow() {
    // host: Start → A → End, A embeds middle: Start → M → Y,
    // M embeds leaf: Start → L
    let mut middle = WorkflowSpec::new("middle");
    let m = middle.add("M", SubWorkflow::new(linear("leaf", &["L"]))).unwrap();
    let y = middle.add("Y", Simple).unwrap();
    middle.chain(&[middle.start(), m, y]).unwrap();

    let mut workflow = Workflow::new(&host_with(middle)).unwrap();
    workflow.complete_all().unwrap();

    assert!(workflow.is_completed());
    assert_eq!(
        names(&workflow),
        vec!["Root", "Start", "A", "Start", "M", "Start", "L", "Y", "End"]
    );
    let (l, y, end) = (only(&workflow, "L"), only(&workflow, "Y"), only(&workflow, "End"));
    assert_eq!(workflow.task(y).unwrap().parent(), Some(l));
    assert_eq!(workflow.task(end).unwrap().parent(), Some(y));
    assert_eq!(workflow.task(only(&workflow, "A")).unwrap().nested().unwrap().tail, y);
    assert_eq!(workflow.task(only(&workflow, "M")).unwrap().nested().unwrap().tail, l);

    let graph = workflow.graph();
    let (l_spec, y_spec) = (spec_of(&workflow, l), spec_of(&workflow, y));
    assert_eq!(graph.node(y_spec).unwrap().inputs(), &[l_spec]);
    graph.check_mutual_edges().unwrap();
}

#[test]
fn assigned_keys_win_over_inherited_ones() {
    let mut nested = WorkflowSpec::new("inner");
    let x = nested.add("X", Simple).unwrap();
    nested.connect(nested.start(), x).unwrap();

    let mut spec = WorkflowSpec::new("host");
    let set = spec
        .add(
            "set",
            Function::from_fn("set_data", nodes::builtin::set_data, vec![json!("k"), json!("host")]),
        )
        .unwrap();
    let embed = spec
        .add(
            "embed",
            SubWorkflow::new(nested).with_in_assign(vec![Assign::value("k", "assigned")]),
        )
        .unwrap();
    spec.chain(&[spec.start(), set, embed]).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    workflow.complete_all().unwrap();

    assert!(workflow.is_completed());
    let embed = workflow.task(only(&workflow, "embed")).unwrap();
    assert_eq!(embed.get_data("k"), Some(&json!("host")));
    let x = workflow.task(only(&workflow, "X")).unwrap();
    assert_eq!(x.get_data("k"), Some(&json!("assigned")));
}

#[test]
fn one_nested_spec_can_back_two_hosts() {
    let nested = Arc::new(linear("shared", &["X"]));
    let mut spec = WorkflowSpec::new("twice");
    let first = spec.add("first", SubWorkflow::new(nested.clone())).unwrap();
    let second = spec.add("second", SubWorkflow::new(nested)).unwrap();
    spec.chain(&[spec.start(), first, second]).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    workflow.complete_all().unwrap();

    assert!(workflow.is_completed());
    assert_eq!(workflow.tasks_named("X").len(), 2);
    assert_eq!(
        names(&workflow),
        vec!["Root", "Start", "first", "Start", "X", "second", "Start", "X"]
    );
}

#[test]
fn splicing_one_spec_twice_in_a_run_is_rejected() {
    // Start → (p, q) → S: two tasks of S, one splice per spec.
    let mut spec = WorkflowSpec::new("merge");
    let p = spec.add("p", Simple).unwrap();
    let q = spec.add("q", Simple).unwrap();
    let s = spec.add("S", SubWorkflow::new(linear("inner", &["X"]))).unwrap();
    spec.connect(spec.start(), p).unwrap();
    spec.connect(spec.start(), q).unwrap();
    spec.connect(p, s).unwrap();
    spec.connect(q, s).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    assert!(matches!(
        workflow.complete_all(),
        Err(EngineError::SpliceReentered(name)) if name == "S"
    ));
}

// ============================================================
// Cancellation
// ============================================================

#[test]
fn cancel_finishes_every_open_task() {
    let gate = WaitForTrigger::new(Function::from_fn(
        "noop",
        nodes::builtin::noop,
        Vec::new(),
    ));
    let mut spec = WorkflowSpec::new("cancel");
    let g = spec.add("gate", gate).unwrap();
    let after = spec.add("after", Simple).unwrap();
    spec.chain(&[spec.start(), g, after]).unwrap();

    let mut workflow = Workflow::new(&spec).unwrap();
    workflow.complete_all().unwrap();
    assert_eq!(state_of(&workflow, "gate"), TaskState::Incomplete);

    workflow.cancel().unwrap();

    assert!(workflow.is_completed());
    assert_eq!(state_of(&workflow, "Start"), TaskState::Completed);
    assert_eq!(state_of(&workflow, "gate"), TaskState::Cancelled);
    assert_eq!(state_of(&workflow, "after"), TaskState::Cancelled);
}
