use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio_util::sync::CancellationToken;
use weavescope_api::{
    AdviceKind, AopModelListener, AopModelQuery, ElementId, MarkerSink, ProjectId, Severity,
};
use weavescope_core::runtime::BuildScheduler;
use weavescope_core::{
    AopReferenceModel, BuildKind, BuildRequest, BuildState, DeltaKind, EngineConfig,
    InMemoryMarkerSink, ReferenceModelBuilder, ResourceDelta, WeaveEngine, WeavescopeError,
};

const SERVICE: &str =
    "package com.acme;\n\npublic class Service {\n    public void doWork() {}\n}\n";

const SERVICE_WITH_UNDO: &str = "package com.acme;\n\npublic class Service {\n    \
    public void doWork() {}\n    public void undo() {}\n}\n";

const BEANS_HEADER: &str = r#"<beans xmlns="http://www.springframework.org/schema/beans"
       xmlns:aop="http://www.springframework.org/schema/aop">"#;

fn beans_xml(body: &str) -> String {
    format!("{}\n{}\n</beans>\n", BEANS_HEADER, body)
}

fn aop_xml(advice: &str) -> String {
    beans_xml(&format!(
        r#"<aop:config><aop:aspect ref="logger">{}</aop:aspect></aop:config>"#,
        advice
    ))
}

const LOG_BEFORE: &str =
    r#"<aop:before method="log" pointcut="execution(* com.acme.Service.*(..))"/>"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    project: ProjectId,
    engine: WeaveEngine,
    markers: Arc<InMemoryMarkerSink>,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        for (path, content) in files {
            write(&root, path, content);
        }
        let markers = Arc::new(InMemoryMarkerSink::new());
        let config = EngineConfig {
            debounce_ms: 50,
            ..EngineConfig::default()
        };
        let engine = WeaveEngine::new(config, markers.clone()).unwrap();
        engine.startup();
        let project = ProjectId::new("shop");
        engine.add_project(project.clone(), &root);
        Self {
            _dir: dir,
            root,
            project,
            engine,
            markers,
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    async fn full_build(&self) {
        self.engine
            .build_now(self.project.clone(), BuildKind::Full)
            .await
            .unwrap();
    }

    fn target_ids(&self) -> Vec<String> {
        let project = self.engine.model().get_project(&self.project).unwrap();
        project
            .references()
            .iter()
            .map(|r| r.target.id.to_string())
            .collect()
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[derive(Default)]
struct CountingListener {
    calls: AtomicUsize,
}

impl AopModelListener for CountingListener {
    fn on_model_changed(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn xml_before_advice_references_service_method() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;

    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1);
    let reference = &references[0];
    assert_eq!(reference.kind, AdviceKind::Before);
    assert_eq!(reference.source.qualified_name(), "logger.log");
    assert_eq!(reference.target.qualified_name(), "com.acme.Service.doWork");
    assert_eq!(reference.resource, fx.path("src/aop.xml"));
    assert!(reference.target_bean.is_none());

    let for_xml = fx
        .engine
        .model()
        .get_all_references_for_resource(&fx.path("src/aop.xml"));
    assert_eq!(for_xml.len(), 1);
}

#[tokio::test]
async fn advice_and_advised_lookups() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;

    let model = fx.engine.model();
    let log = ElementId::new("logger.log()");
    let do_work = ElementId::new("com.acme.Service.doWork()");
    assert!(model.is_advice(&log));
    assert!(model.is_advised(&do_work));
    assert_eq!(model.get_advice_definition(&log).len(), 1);

    assert!(!model.is_advice(&do_work));
    assert!(!model.is_advised(&log));
    assert!(!model.is_advised(&ElementId::new("com.acme.Other.run()")));
    assert!(model.get_advice_definition(&ElementId::new("nothing.here()")).is_empty());
}

#[tokio::test]
async fn deleting_target_removes_references_and_markers() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;
    let service = fx.path("src/com/acme/Service.java");
    assert!(!fx.markers.markers_on(&service).is_empty());

    fs::remove_file(&service).unwrap();
    let scheduled = fx
        .engine
        .apply_deltas(&[ResourceDelta::new(&service, DeltaKind::Removed)]);
    assert_eq!(scheduled, 1);
    fx.engine.wait_idle().await;

    let project = fx.engine.model().get_project(&fx.project).unwrap();
    assert!(project.references().is_empty());
    assert!(fx.engine.model().get_all_references_for_resource(&service).is_empty());
    assert!(fx.markers.all().iter().all(|m| m.resource != service));
}

#[tokio::test]
async fn invalid_pointcut_marks_definition_and_spares_others() {
    let advice = format!(
        "{}\n<aop:after method=\"broken\" pointcut=\"execution(* foo(\"/>",
        LOG_BEFORE
    );
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(&advice)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;

    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].kind, AdviceKind::Before);

    let problems = fx.markers.problems();
    assert_eq!(problems.len(), 1, "{:?}", problems);
    assert_eq!(problems[0].resource, fx.path("src/aop.xml"));
    assert!(problems[0].message.contains("execution(* foo("));
}

#[tokio::test]
async fn removed_project_has_no_partition() {
    let fx = Fixture::new(&[("src/com/acme/Service.java", SERVICE)]);
    fx.full_build().await;
    assert!(fx.engine.model().get_project(&fx.project).is_some());

    fx.engine.model().remove_project(&fx.project);
    assert!(fx.engine.model().get_project(&fx.project).is_none());
    assert!(fx.engine.model().get_all_references().is_empty());
}

#[tokio::test]
async fn rebuilding_unchanged_sources_is_idempotent() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
        (
            "src/com/acme/Audit.java",
            "package com.acme;\n\npublic class Audit {\n    \
             public void record(String entry) {}\n    public int size() { return 0; }\n}\n",
        ),
    ]);
    fx.full_build().await;
    let first = fx.engine.model().get_project(&fx.project).unwrap();
    fx.full_build().await;
    let second = fx.engine.model().get_project(&fx.project).unwrap();

    assert_eq!(first.references(), second.references());
    assert!(second.version() > first.version());
}

#[tokio::test]
async fn pending_submissions_coalesce_into_one_run() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    let listener = Arc::new(CountingListener::default());
    fx.engine.model().register_listener(listener.clone());

    // Nothing runs until this task yields, so the second request supersedes
    // the first before the driver picks either up.
    let scheduler = fx.engine.scheduler();
    scheduler.submit(BuildRequest::incremental(
        fx.project.clone(),
        [fx.path("src/com/acme/Service.java")],
    ));
    scheduler.submit(BuildRequest::incremental(
        fx.project.clone(),
        [fx.path("src/com/acme/Service.java"), fx.path("src/aop.xml")],
    ));
    fx.engine.wait_idle().await;

    assert_eq!(scheduler.runs(&fx.project), 1);
    assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);
}

#[tokio::test]
async fn target_change_rematches_only_its_types() {
    let fx = Fixture::new(&[
        (
            "src/aop.xml",
            &aop_xml(r#"<aop:before method="log" pointcut="execution(* com.acme.*.*(..))"/>"#),
        ),
        ("src/com/acme/Service.java", SERVICE),
        (
            "src/com/acme/Audit.java",
            "package com.acme;\n\npublic class Audit {\n    public void record() {}\n}\n",
        ),
    ]);
    fx.full_build().await;
    let before = fx.engine.model().get_project(&fx.project).unwrap();
    let service_refs: Vec<_> = before
        .references()
        .iter()
        .filter(|r| r.target.declaring_type == "com.acme.Service")
        .cloned()
        .collect();
    assert_eq!(service_refs.len(), 1);

    write(
        &fx.root,
        "src/com/acme/Audit.java",
        "package com.acme;\n\npublic class Audit {\n    \
         public void record() {}\n    public void flush() {}\n}\n",
    );
    fx.engine.apply_deltas(&[ResourceDelta::new(
        fx.path("src/com/acme/Audit.java"),
        DeltaKind::Changed,
    )]);
    fx.engine.wait_idle().await;

    let report = fx.engine.scheduler().last_report(&fx.project).unwrap();
    assert!(!report.full_rematch);
    let after = fx.engine.model().get_project(&fx.project).unwrap();
    let service_after: Vec<_> = after
        .references()
        .iter()
        .filter(|r| r.target.declaring_type == "com.acme.Service")
        .cloned()
        .collect();
    assert_eq!(service_refs, service_after);
    assert_eq!(
        fx.target_ids(),
        vec![
            "com.acme.Audit.flush()",
            "com.acme.Audit.record()",
            "com.acme.Service.doWork()",
        ]
    );

    write(
        &fx.root,
        "src/aop.xml",
        &aop_xml(r#"<aop:before method="log" pointcut="execution(* com.acme.Audit.*(..))"/>"#),
    );
    fx.engine.apply_deltas(&[ResourceDelta::new(fx.path("src/aop.xml"), DeltaKind::Changed)]);
    fx.engine.wait_idle().await;

    let report = fx.engine.scheduler().last_report(&fx.project).unwrap();
    assert!(report.full_rematch);
    assert_eq!(
        fx.target_ids(),
        vec!["com.acme.Audit.flush()", "com.acme.Audit.record()"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_see_whole_commits_only() {
    let fx = Fixture::new(&[
        (
            "src/aop.xml",
            &aop_xml(r#"<aop:before method="log" pointcut="execution(* com.acme.*.*(..))"/>"#),
        ),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;
    let xml = fx.path("src/aop.xml");

    let model = Arc::clone(fx.engine.model());
    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let done = Arc::clone(&done);
        let xml = xml.clone();
        std::thread::spawn(move || {
            let mut seen = Vec::new();
            while !done.load(Ordering::SeqCst) {
                seen.push(model.get_all_references_for_resource(&xml).len());
            }
            seen
        })
    };

    for round in 0..5 {
        let content = if round % 2 == 0 { SERVICE_WITH_UNDO } else { SERVICE };
        write(&fx.root, "src/com/acme/Service.java", content);
        fx.engine.apply_deltas(&[ResourceDelta::new(
            fx.path("src/com/acme/Service.java"),
            DeltaKind::Changed,
        )]);
        fx.engine.wait_idle().await;
    }
    done.store(true, Ordering::SeqCst);

    let seen = reader.join().unwrap();
    assert!(seen.iter().all(|n| *n == 1 || *n == 2), "{:?}", seen);
}

#[tokio::test]
async fn closing_a_project_clears_its_state() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;
    assert!(!fx.markers.all().is_empty());

    fx.engine.close_project(&fx.project).await.unwrap();
    assert!(fx.engine.model().get_project(&fx.project).is_none());
    assert!(fx.markers.all().is_empty());
    assert_eq!(
        fx.engine
            .apply_deltas(&[ResourceDelta::new(fx.path("src/aop.xml"), DeltaKind::Changed)]),
        0
    );
}


/// Records the scheduler state each time a build commits.
struct StateRecorder {
    scheduler: Weak<BuildScheduler>,
    project: ProjectId,
    seen: Mutex<Vec<BuildState>>,
}

impl AopModelListener for StateRecorder {
    fn on_model_changed(&self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            self.seen.lock().unwrap().push(scheduler.state(&self.project));
        }
    }
}

#[test]
fn cancelled_run_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/aop.xml", &aop_xml(LOG_BEFORE));
    write(root, "src/com/acme/Service.java", SERVICE);

    let model = Arc::new(AopReferenceModel::new());
    model.startup();
    let markers = Arc::new(InMemoryMarkerSink::new());
    let builder =
        ReferenceModelBuilder::new(model.clone(), markers.clone(), EngineConfig::default())
            .unwrap();
    let project = ProjectId::new("shop");
    builder.register(project.clone(), root);
    builder
        .run(&BuildRequest::full(project.clone()), &CancellationToken::new())
        .unwrap();
    let committed = model.get_project(&project).unwrap();
    let marker_count = markers.all().len();
    let listener = Arc::new(CountingListener::default());
    model.register_listener(listener.clone());

    write(root, "src/com/acme/Service.java", SERVICE_WITH_UNDO);
    let request =
        BuildRequest::incremental(project.clone(), [root.join("src/com/acme/Service.java")]);
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let result = builder.run(&request, &cancelled);
    assert!(matches!(result, Err(WeavescopeError::Cancelled(_))), "{:?}", result);
    assert!(Arc::ptr_eq(&committed, &model.get_project(&project).unwrap()));
    assert_eq!(listener.calls.load(Ordering::SeqCst), 0);
    assert_eq!(markers.all().len(), marker_count);

    // The cancelled run cached nothing, so the same change is picked up again.
    let report = builder.run(&request, &CancellationToken::new()).unwrap();
    assert_eq!(report.resources_parsed, 1);
    assert_eq!(report.references, 2);
    assert_eq!(report.version, committed.version() + 1);
    assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scheduler_walks_through_build_states() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    let scheduler = Arc::clone(fx.engine.scheduler());
    let recorder = Arc::new(StateRecorder {
        scheduler: Arc::downgrade(&scheduler),
        project: fx.project.clone(),
        seen: Mutex::default(),
    });
    fx.engine.model().register_listener(recorder.clone());
    assert_eq!(scheduler.state(&fx.project), BuildState::Idle);

    fx.engine.open_project(fx.project.clone(), &fx.root);
    assert_eq!(scheduler.state(&fx.project), BuildState::Scheduled);
    fx.engine.wait_idle().await;
    assert_eq!(scheduler.state(&fx.project), BuildState::Idle);
    assert_eq!(scheduler.runs(&fx.project), 1);
    assert_eq!(*recorder.seen.lock().unwrap(), vec![BuildState::Running]);
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);

    scheduler.submit(BuildRequest::full(fx.project.clone()));
    scheduler.cancel(&fx.project);
    assert_eq!(scheduler.state(&fx.project), BuildState::Cancelled);
    fx.engine.wait_idle().await;
    assert_eq!(scheduler.state(&fx.project), BuildState::Cancelled);
    assert_eq!(scheduler.runs(&fx.project), 1);
    assert_eq!(recorder.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn clean_build_drops_partition_and_markers() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;
    assert!(!fx.markers.all().is_empty());

    let report = fx
        .engine
        .build_now(fx.project.clone(), BuildKind::Clean)
        .await
        .unwrap();
    assert_eq!(report.kind, BuildKind::Clean);
    assert_eq!(report.references, 0);
    assert!(fx.engine.model().get_project(&fx.project).is_none());
    assert!(fx.engine.model().get_all_references().is_empty());
    assert!(fx.markers.all().is_empty());

    fx.full_build().await;
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);
}

#[tokio::test]
async fn build_all_rebuilds_registered_projects() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &aop_xml(LOG_BEFORE)),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;
    let first = fx.engine.model().get_project(&fx.project).unwrap();

    assert_eq!(fx.engine.build_all(BuildKind::Full), 1);
    fx.engine.wait_idle().await;
    let second = fx.engine.model().get_project(&fx.project).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.references(), second.references());
    assert_eq!(fx.engine.scheduler().runs(&fx.project), 1);
}

#[tokio::test]
async fn annotation_aspect_advises_service() {
    let fx = Fixture::new(&[
        (
            "src/com/acme/aop/Tracing.java",
            r#"package com.acme.aop;

import org.aspectj.lang.annotation.Aspect;
import org.aspectj.lang.annotation.Before;

@Aspect
public class Tracing {
    @Before("execution(* com.acme.Service.*(..))")
    public void trace() {}
}
"#,
        ),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;

    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1, "{:?}", references);
    let reference = &references[0];
    assert_eq!(reference.kind, AdviceKind::Before);
    assert_eq!(reference.source.qualified_name(), "com.acme.aop.Tracing.trace");
    assert_eq!(reference.target.qualified_name(), "com.acme.Service.doWork");
    assert_eq!(reference.resource, fx.path("src/com/acme/aop/Tracing.java"));
    assert!(fx.markers.problems().is_empty(), "{:?}", fx.markers.problems());
}

#[tokio::test]
async fn declare_parents_introduces_interface_on_matching_types() {
    let fx = Fixture::new(&[
        (
            "src/aop.xml",
            &aop_xml(
                r#"<aop:declare-parents types-matching="com.acme.Service+"
    implement-interface="com.acme.Auditable" default-impl="com.acme.DefaultAuditable"/>"#,
            ),
        ),
        ("src/com/acme/Service.java", SERVICE),
        (
            "src/com/acme/Auditable.java",
            "package com.acme;\n\npublic interface Auditable {\n    void audit();\n}\n",
        ),
        (
            "src/com/acme/DefaultAuditable.java",
            "package com.acme;\n\npublic class DefaultAuditable implements Auditable {\n    \
             public void audit() {}\n}\n",
        ),
    ]);
    fx.full_build().await;

    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1, "{:?}", references);
    let reference = &references[0];
    assert_eq!(reference.kind, AdviceKind::DeclareParents);
    assert_eq!(reference.target.id, ElementId::for_type("com.acme.Service"));
    assert_eq!(reference.source.qualified_name(), "com.acme.DefaultAuditable");
    assert!(fx.engine.model().is_advised(&ElementId::for_type("com.acme.Service")));
}

const TRACER: &str = r#"package com.acme;

import org.aopalliance.intercept.MethodInterceptor;
import org.aopalliance.intercept.MethodInvocation;

public class Tracer implements MethodInterceptor {
    public Object invoke(MethodInvocation invocation) throws Throwable {
        return invocation.proceed();
    }
}
"#;

const TRACER_ADVISOR: &str = r#"<bean id="tracer" class="com.acme.Tracer"/>
<aop:config>
  <aop:advisor advice-ref="tracer" pointcut="execution(* com.acme.Service.*(..))"/>
</aop:config>"#;

#[tokio::test]
async fn advisor_takes_kind_from_advice_interface() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &beans_xml(TRACER_ADVISOR)),
        ("src/com/acme/Service.java", SERVICE),
        ("src/com/acme/Tracer.java", TRACER),
    ]);
    fx.full_build().await;

    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1, "{:?}", references);
    assert_eq!(references[0].kind, AdviceKind::Around);
    assert_eq!(references[0].source.qualified_name(), "com.acme.Tracer.invoke");
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);
}

#[tokio::test]
async fn deleting_advice_class_reports_unresolved_advisor() {
    let fx = Fixture::new(&[
        ("src/aop.xml", &beans_xml(TRACER_ADVISOR)),
        ("src/com/acme/Service.java", SERVICE),
        ("src/com/acme/Tracer.java", TRACER),
    ]);
    fx.full_build().await;
    assert!(fx.markers.problems().is_empty());

    let tracer = fx.path("src/com/acme/Tracer.java");
    fs::remove_file(&tracer).unwrap();
    fx.engine
        .apply_deltas(&[ResourceDelta::new(&tracer, DeltaKind::Removed)]);
    fx.engine.wait_idle().await;

    let report = fx.engine.scheduler().last_report(&fx.project).unwrap();
    assert!(report.full_rematch);
    assert!(fx.engine.model().get_all_references().is_empty());
    let problems = fx.markers.problems();
    assert!(
        problems.iter().all(|p| p.resource == fx.path("src/aop.xml")),
        "{:?}",
        problems
    );
    assert!(
        problems
            .iter()
            .any(|p| p.message.contains("Advice bean 'tracer' cannot be resolved")),
        "{:?}",
        problems
    );
}

#[tokio::test]
async fn editing_aspect_bean_class_keeps_its_references() {
    let logger = "package com.acme;\n\npublic class Logger {\n    public void log() {}\n}\n";
    let xml = aop_xml(LOG_BEFORE).replace(
        "<aop:config>",
        "<bean id=\"logger\" class=\"com.acme.Logger\"/>\n<aop:config>",
    );
    let fx = Fixture::new(&[
        ("src/aop.xml", &xml),
        ("src/com/acme/Service.java", SERVICE),
        ("src/com/acme/Logger.java", logger),
    ]);
    fx.full_build().await;
    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].source.qualified_name(), "com.acme.Logger.log");
    let logger_path = fx.path("src/com/acme/Logger.java");
    assert!(!fx.markers.markers_on(&logger_path).is_empty());

    write(
        &fx.root,
        "src/com/acme/Logger.java",
        "package com.acme;\n\npublic class Logger {\n    public void flush() {}\n\n    \
         public void log() {}\n}\n",
    );
    fx.engine
        .apply_deltas(&[ResourceDelta::new(&logger_path, DeltaKind::Changed)]);
    fx.engine.wait_idle().await;

    let report = fx.engine.scheduler().last_report(&fx.project).unwrap();
    assert!(report.full_rematch);
    let references = fx.engine.model().get_all_references();
    assert_eq!(references.len(), 1, "{:?}", references);
    assert_eq!(references[0].source.qualified_name(), "com.acme.Logger.log");
    assert_eq!(references[0].source.line, 6);
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);
    assert!(!fx.markers.markers_on(&logger_path).is_empty());
}

#[tokio::test]
async fn non_utf8_aspect_file_is_decoded_and_rebuilt() {
    let fx = Fixture::new(&[("src/com/acme/Service.java", SERVICE)]);
    let xml = fx.path("src/aop.xml");
    let mut latin1 =
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<!-- caf\xe9 -->\n".to_vec();
    latin1.extend_from_slice(aop_xml(LOG_BEFORE).as_bytes());
    fs::write(&xml, &latin1).unwrap();
    fx.full_build().await;
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);
    assert!(fx.markers.problems().is_empty(), "{:?}", fx.markers.problems());

    // No advice left and a stray byte outside any declared encoding.
    let mut stray = beans_xml("<!-- \u{0} -->").into_bytes();
    let at = stray.iter().position(|b| *b == 0).unwrap();
    stray[at] = 0xff;
    fs::write(&xml, &stray).unwrap();
    fx.engine
        .apply_deltas(&[ResourceDelta::new(&xml, DeltaKind::Changed)]);
    fx.engine.wait_idle().await;

    assert!(fx.engine.model().get_all_references().is_empty());
    assert!(fx.markers.all().iter().all(|m| m.owner != xml || m.severity != Severity::Info));
    let problems = fx.markers.problems();
    assert_eq!(problems.len(), 1, "{:?}", problems);
    assert_eq!(problems[0].resource, xml);
    assert_eq!(problems[0].severity, Severity::Warning);
    assert!(problems[0].message.contains("not valid UTF-8"));
}

#[tokio::test]
async fn namespace_free_aspect_fragment_builds() {
    let fx = Fixture::new(&[
        (
            "src/aop.xml",
            concat!(
                r#"<aop:config><aop:aspect ref="logger">"#,
                r#"<aop:before method="log" pointcut="execution(* com.acme.Service.*(..))"/>"#,
                r#"</aop:aspect></aop:config>"#,
            ),
        ),
        ("src/com/acme/Service.java", SERVICE),
    ]);
    fx.full_build().await;

    assert!(fx.markers.problems().is_empty(), "{:?}", fx.markers.problems());
    assert_eq!(fx.target_ids(), vec!["com.acme.Service.doWork()"]);
}
