//! End-to-end tests for stage trees and pipelines.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    use crate::context::InMemoryRegistry;
    use crate::core::{ArgumentContract, ArgumentValue, HandlerOutput, MultiValue, Phase};
    use crate::errors::{BranchflowError, Operation};
    use crate::handlers::{Handler, HandlerDescriptor, InjectionPoint, OutputShape};
    use crate::pipeline::{Pipeline, PipelineConfig};
    use crate::stages::{Stage, StagePath, StageStep};
    use crate::testing::{
        capture_logs, init_test_tracing, CallLog, Failing, Increment, Parity, Recorder, Sink,
        ToText,
    };

    fn int() -> ArgumentContract {
        ArgumentContract::of::<i32>()
    }

    fn text() -> ArgumentContract {
        ArgumentContract::of::<String>()
    }

    fn boolean() -> ArgumentContract {
        ArgumentContract::of::<bool>()
    }

    fn phases(stage: &Stage) -> Vec<Phase> {
        let mut phases = Vec::new();
        stage.walk(&mut |s| phases.push(s.phase()));
        phases
    }

    trait Greeting: Send + Sync {
        fn greet(&self, name: &str) -> String;
    }

    struct Polite;

    impl Greeting for Polite {
        fn greet(&self, name: &str) -> String {
            format!("Good day, {name}")
        }
    }

    #[derive(Default)]
    struct Greeter {
        greeting: Option<Arc<dyn Greeting>>,
        suffix: Option<Arc<String>>,
    }

    impl Greeter {
        fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
            let greeting = self
                .greeting
                .as_ref()
                .ok_or_else(|| anyhow!("greeting was not injected"))?;
            let mut line = greeting.greet(args[0].get::<String>()?);
            if let Some(suffix) = &self.suffix {
                line.push_str(suffix);
            }
            Ok(HandlerOutput::single(line))
        }
    }

    impl Handler for Greeter {
        fn descriptor() -> HandlerDescriptor<Self> {
            HandlerDescriptor::new("Greeter")
                .input::<String>()
                .output(OutputShape::single::<String>())
                .main(Self::process)
                .inject(InjectionPoint::<Self>::by_capability::<dyn Greeting>(
                    "greeting",
                    |h, g| h.greeting = Some(g),
                ))
                .inject(
                    InjectionPoint::<Self>::by_type::<String>("suffix", |h, s| h.suffix = Some(s))
                        .optional(),
                )
        }
    }

    // Successive attaches: the second succeeds exactly when its input matches
    // the output left by the first.

    #[test]
    fn test_successive_attach_matching() {
        let stage = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::init(Increment::default()).unwrap()])
            .unwrap()
            .attach([Stage::init(ToText::default()).unwrap()]);
        assert!(stage.is_ok());
    }

    #[test]
    fn test_successive_attach_mismatching() {
        let err = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::init(ToText::default()).unwrap()])
            .unwrap()
            .attach([Stage::init(Increment::default()).unwrap()])
            .unwrap_err();

        let BranchflowError::ContractMismatch(mismatch) = err else {
            panic!("expected a contract mismatch, got {err:?}");
        };
        assert_eq!(mismatch.phase, Phase::Building);
        assert_eq!(mismatch.producer, vec![text()]);
        assert_eq!(mismatch.consumer, vec![int()]);
        assert_eq!(mismatch.position, Some(0));
    }

    #[test]
    fn test_arity_mismatch_after_multi_output() {
        let err = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::init(Parity).unwrap()])
            .unwrap()
            .attach([Stage::init(ToText::default()).unwrap()])
            .unwrap_err();

        let BranchflowError::ContractMismatch(mismatch) = err else {
            panic!("expected a contract mismatch, got {err:?}");
        };
        assert_eq!(mismatch.position, None);
        assert_eq!(mismatch.producer, vec![text(), boolean()]);
    }

    // Phase machine.

    #[test]
    fn test_run_while_building_fails_then_succeeds_after_freeze() {
        init_test_tracing();
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::init(ToText::default()).unwrap()])
            .unwrap();

        let err = stage.run(&[ArgumentValue::new(1_i32)]).unwrap_err();
        assert!(matches!(err, BranchflowError::PhaseViolation { phase: Phase::Building, .. }));

        stage.freeze().unwrap();
        let out = stage.run(&[ArgumentValue::new(1_i32)]).unwrap();
        assert_eq!(out[0].get::<String>().unwrap(), "2");

        let err = stage
            .attach_step(StageStep::single(Stage::bridge()))
            .unwrap_err();
        assert_eq!(err.code(), "BRANCH-001-PHASE");

        stage.thaw();
        stage.attach_step(StageStep::single(Stage::bridge())).unwrap();
        assert_eq!(stage.phase(), Phase::Building);
    }

    #[test]
    fn test_nested_attach_fails_in_frozen_tree() {
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([
                Stage::init(Increment::default()).unwrap(),
                Stage::init(ToText::default()).unwrap(),
            ])
            .unwrap();
        stage.freeze().unwrap();

        let err = stage
            .attach_at(
                &StagePath::root().child(0, 0),
                StageStep::single(Stage::init(Increment::default()).unwrap()),
            )
            .unwrap_err();
        assert!(matches!(err, BranchflowError::PhaseViolation { .. }));
        assert_eq!(phases(&stage), vec![Phase::Processing; 3]);
    }

    #[test]
    fn test_attach_on_one_branch_resets_every_stage() {
        let mut left = Stage::init(Increment::default()).unwrap();
        left.freeze().unwrap();
        let mut right = Stage::init(ToText::default()).unwrap();
        right.freeze().unwrap();

        // Grafting frozen branches resets them.
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([left, right])
            .unwrap();
        assert_eq!(phases(&stage), vec![Phase::Building; 3]);

        stage.freeze().unwrap();
        assert_eq!(phases(&stage), vec![Phase::Processing; 3]);

        stage.thaw();
        stage.freeze().unwrap();
        stage.thaw();
        stage
            .attach_at(
                &StagePath::root().child(0, 0),
                StageStep::single(Stage::init(Increment::default()).unwrap()),
            )
            .unwrap();

        let sibling = stage.stage_at(&StagePath::root().child(0, 1)).unwrap();
        assert_eq!(sibling.phase(), Phase::Building);
        assert_eq!(phases(&stage), vec![Phase::Building; 4]);

        stage.freeze().unwrap();
        let out = stage.run(&[ArgumentValue::new(1_i32)]).unwrap();
        assert_eq!(*out[0].get::<i32>().unwrap(), 4);
        assert_eq!(out[1].get::<String>().unwrap(), "2");
    }

    // Contract resolution.

    #[test]
    fn test_resolve_mapped_contracts_idempotent() {
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::duplicate()])
            .unwrap()
            .attach([Stage::swap()])
            .unwrap();
        stage.freeze().unwrap();

        let inputs = stage.main_input_contracts().to_vec();
        let first = stage.resolve_mapped_contracts(&inputs).unwrap();
        let second = stage.resolve_mapped_contracts(&inputs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![int(), int()]);
        assert_eq!(stage.resolved_output_contracts(), Some(&first[..]));
    }

    #[test]
    fn test_duplicate_resolves_and_runs() {
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::duplicate()])
            .unwrap();
        stage.freeze().unwrap();
        assert_eq!(stage.resolved_output_contracts(), Some(&[int(), int()][..]));

        let out = stage.run(&[ArgumentValue::new(1_i32)]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| *v.get::<i32>().unwrap() == 2));
    }

    #[test]
    fn test_duplicate_on_erased_input_is_meaningless() {
        // A bridge root only ever sees its own erased input contract.
        let mut stage = Stage::bridge().attach([Stage::duplicate()]).unwrap();
        let err = stage.freeze().unwrap_err();
        assert!(matches!(err, BranchflowError::MeaninglessMapping { .. }));
        assert_eq!(stage.phase(), Phase::Building);
    }

    #[test]
    fn test_swap_reverses_contracts_and_values() {
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([Stage::init(Parity).unwrap()])
            .unwrap()
            .attach([Stage::swap()])
            .unwrap();
        stage.freeze().unwrap();
        assert_eq!(
            stage.resolved_output_contracts(),
            Some(&[boolean(), text()][..])
        );

        let out = stage.run(&[ArgumentValue::new(1_i32)]).unwrap();
        assert!(*out[0].get::<bool>().unwrap());
        assert_eq!(out[1].get::<String>().unwrap(), "even");
    }

    // Branching.

    #[test]
    fn test_step_combined_output_and_execution_order() {
        let step = StageStep::new([
            Stage::init(Increment::default()).unwrap(),
            Stage::init(Parity).unwrap(),
        ])
        .unwrap();
        assert_eq!(step.combined_output(), vec![int(), text(), boolean()]);

        let log = CallLog::new();
        let mut stage = Stage::init(Recorder::new("root", log.clone())).unwrap();
        stage.attach_step(step).unwrap();
        stage.freeze().unwrap();

        let out = stage.run(&[ArgumentValue::new(5_i32)]).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(*out[0].get::<i32>().unwrap(), 6);
        assert_eq!(out[1].get::<String>().unwrap(), "odd");
        assert!(!*out[2].get::<bool>().unwrap());
        assert_eq!(log.entries(), vec!["root:before", "root:main", "root:after"]);
    }

    #[test]
    fn test_siblings_run_in_declaration_order() {
        let log = CallLog::new();
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([
                Stage::init(Recorder::new("a", log.clone())).unwrap(),
                Stage::init(Recorder::new("b", log.clone())).unwrap(),
            ])
            .unwrap();
        stage.freeze().unwrap();
        stage.run(&[ArgumentValue::new(0_i32)]).unwrap();

        assert_eq!(
            log.entries(),
            vec!["a:before", "a:main", "a:after", "b:before", "b:main", "b:after"]
        );
    }

    #[test]
    fn test_first_sibling_failure_aborts_run() {
        let log = CallLog::new();
        let mut stage = Stage::init(Increment::default())
            .unwrap()
            .attach([
                Stage::init(Failing::new(log.clone())).unwrap(),
                Stage::init(Recorder::new("after", log.clone())).unwrap(),
            ])
            .unwrap();
        stage.freeze().unwrap();

        let err = stage.run(&[ArgumentValue::new(3_i32)]).unwrap_err();
        let BranchflowError::InvocationFailure { handler, operation, source } = &err else {
            panic!("expected an invocation failure, got {err:?}");
        };
        assert_eq!(handler, "Failing");
        assert_eq!(*operation, Operation::Main);
        assert_eq!(source.to_string(), "refusing input 4");
        assert_eq!(log.entries(), vec!["failing:main"]);
    }

    #[test]
    fn test_unit_result_produces_empty_tuple() {
        let log = CallLog::new();
        let mut stage = Stage::init(Sink::new(log.clone())).unwrap();
        assert!(stage.main_output_contracts().is_empty());
        stage.freeze().unwrap();

        let out = stage.run(&[ArgumentValue::new(9_i32)]).unwrap();
        assert!(out.is_empty());
        assert_eq!(log.entries(), vec!["sink:9"]);
    }

    struct Miscounted;

    impl Miscounted {
        fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
            let n = *args[0].get::<i32>()?;
            Ok(MultiValue::new().with(n).with(n).with(n).into())
        }
    }

    impl Handler for Miscounted {
        fn descriptor() -> HandlerDescriptor<Self> {
            HandlerDescriptor::new("Miscounted").input::<i32>().main(Self::process)
        }
    }

    #[test]
    fn test_leaf_result_checked_against_declared_outputs() {
        let mut stage = Stage::init(Miscounted).unwrap();
        stage.freeze().unwrap();
        assert_eq!(stage.resolved_output_contracts(), Some(&[][..]));

        let err = stage.run(&[ArgumentValue::new(1_i32)]).unwrap_err();
        assert!(matches!(
            err,
            BranchflowError::InvocationFailure { operation: Operation::Main, .. }
        ));
    }

    // Injection.

    #[test]
    fn test_required_injection_missing_fails_freeze() {
        let mut stage = Stage::init(Greeter::default()).unwrap();
        let err = stage.freeze().unwrap_err();

        let BranchflowError::InjectionFailure { handler, field, .. } = &err else {
            panic!("expected an injection failure, got {err:?}");
        };
        assert_eq!(handler, "Greeter");
        assert_eq!(*field, "greeting");
        assert_eq!(stage.phase(), Phase::Building);
    }

    #[test]
    fn test_optional_injection_missing_still_runs() {
        let registry = InMemoryRegistry::new();
        registry.provide_capability::<dyn Greeting>(Arc::new(Polite));

        let mut stage = Stage::init(Greeter::default()).unwrap();
        let (frozen, logs) = capture_logs(|| stage.freeze_with(&registry));
        frozen.unwrap();

        assert!(logs.contains("WARN"));
        assert!(logs.contains("No dependency found for optional field"));
        assert!(logs.contains("field=\"suffix\"") || logs.contains("field=suffix"));

        let out = stage.run(&[ArgumentValue::new("Ada".to_string())]).unwrap();
        assert_eq!(out[0].get::<String>().unwrap(), "Good day, Ada");
    }

    #[test]
    fn test_pipeline_injects_from_registry() {
        let registry = InMemoryRegistry::new();
        registry.provide_capability::<dyn Greeting>(Arc::new(Polite));
        registry.provide("!".to_string());

        let mut pipeline = Pipeline::new("greetings", Stage::init(Greeter::default()).unwrap())
            .with_registry(Arc::new(registry))
            .with_config(PipelineConfig::new().with_slow_run_warn_ms(60_000));
        pipeline.freeze().unwrap();

        let out = pipeline.run(&[ArgumentValue::new("Ada".to_string())]).unwrap();
        assert_eq!(out[0].get::<String>().unwrap(), "Good day, Ada!");
    }

    // Concurrent replay.

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replay_isolates_failures() {
        let root = Stage::init(Increment::default())
            .unwrap()
            .attach([
                Stage::init(ToText::default()).unwrap(),
                Stage::init(Parity).unwrap(),
            ])
            .unwrap();
        let mut pipeline = Pipeline::new("fanout", root)
            .with_config(PipelineConfig::new().with_max_concurrent_runs(4));
        pipeline.freeze().unwrap();

        let mut batches: Vec<Vec<ArgumentValue>> =
            (0..16_i32).map(|n| vec![ArgumentValue::new(n)]).collect();
        batches.push(vec![ArgumentValue::new("bad".to_string())]);

        let results = pipeline.run_concurrent(batches).await;
        assert_eq!(results.len(), 17);

        for (n, result) in results.iter().take(16).enumerate() {
            let out = result.as_ref().unwrap();
            assert_eq!(out[0].get::<String>().unwrap(), &(n + 1).to_string());
            assert_eq!(*out[2].get::<bool>().unwrap(), (n + 1) % 2 == 0);
        }
        assert!(matches!(
            results[16],
            Err(BranchflowError::ContractMismatch(_))
        ));
    }
}
