use std::path::Path;
use weavescope_java::{JavaParser, JavaTypeKind};

fn parse(src: &str) -> weavescope_java::JavaCompilationUnit {
    JavaParser::new()
        .expect("grammar loads")
        .parse(src, Path::new("src/com/acme/Service.java"))
        .expect("tree")
}

#[test]
fn test_class_members_and_hierarchy() {
    let unit = parse(
        r#"
package com.acme;

import java.util.List;

public class Service extends BaseService implements Api, java.io.Serializable {
    private String name;

    public Service(String name) { this.name = name; }

    public void doWork() {}

    public List<String> names(int limit, String... filters) { return null; }

    static void helper() {}
}
"#,
    );
    assert!(!unit.has_syntax_errors);
    assert_eq!(unit.types.len(), 1);
    let ty = &unit.types[0];
    assert_eq!(ty.fqn, "com.acme.Service");
    assert_eq!(ty.kind, JavaTypeKind::Class);
    assert_eq!(ty.superclass.as_deref(), Some("com.acme.BaseService"));
    assert_eq!(ty.interfaces, vec!["com.acme.Api", "java.io.Serializable"]);
    assert_eq!(ty.start_line, 6);

    let ctor = ty.methods.iter().find(|m| m.is_constructor).unwrap();
    assert_eq!(ctor.parameter_types(), vec!["java.lang.String"]);

    let names = ty.find_method("names", &[]).unwrap();
    assert_eq!(
        names.parameter_types(),
        vec!["int", "java.lang.String[]"]
    );
    assert_eq!(names.return_type.as_deref(), Some("java.util.List"));
    assert!(names.is_public());
    assert_eq!(
        names.element_id("com.acme.Service").as_str(),
        "com.acme.Service.names(int,java.lang.String[])"
    );

    let helper = ty.find_method("helper", &[]).unwrap();
    assert!(helper.is_static() && !helper.is_public());

    assert_eq!(ty.fields.len(), 1);
    assert_eq!(ty.fields[0].type_name, "java.lang.String");
}

#[test]
fn test_interface_members_are_implicitly_public() {
    let unit = parse(
        r#"
package com.acme;
public interface Api {
    void call();
    default void other() {}
}
"#,
    );
    let ty = &unit.types[0];
    assert!(ty.is_interface());
    assert!(ty.is_abstract());
    assert!(ty.methods.iter().all(|m| m.is_public()));
    assert!(ty.methods[0].has_modifier("abstract"));
    assert!(!ty.methods[1].has_modifier("abstract"));
}

#[test]
fn test_nested_types_resolve_within_unit() {
    let unit = parse(
        r#"
package com.acme;
public class Outer {
    public Inner make(Inner other) { return other; }
    public static class Inner {}
    enum Mode { A, B; void tick() {} }
}
"#,
    );
    let fqns: Vec<_> = unit.types.iter().map(|t| t.fqn.as_str()).collect();
    assert_eq!(fqns, vec!["com.acme.Outer", "com.acme.Outer.Inner", "com.acme.Outer.Mode"]);
    let make = unit.types[0].find_method("make", &[]).unwrap();
    assert_eq!(make.parameter_types(), vec!["com.acme.Outer.Inner"]);
    assert_eq!(unit.types[2].kind, JavaTypeKind::Enum);
    assert!(unit.types[2].find_method("tick", &[]).is_some());
}

#[test]
fn test_annotation_values() {
    let unit = parse(
        r#"
package com.acme;
import org.aspectj.lang.annotation.*;
@Aspect
public class Tracing {
    @Before(value = "execution(* *(..)) " + "&& args(x)", argNames = "x")
    public void trace(Object x) {}

    @AfterReturning(pointcut = "execution(* get*(..))", returning = "ret")
    public void after(Object ret) {}
}
"#,
    );
    let ty = &unit.types[0];
    let aspect = ty.annotation("Aspect").unwrap();
    assert_eq!(aspect.name, "org.aspectj.lang.annotation.Aspect");

    let before = ty.methods[0].annotation("Before").unwrap();
    assert_eq!(before.string("value"), Some("execution(* *(..)) && args(x)"));
    assert_eq!(before.string("argNames"), Some("x"));

    let after = ty.methods[1].annotation("AfterReturning").unwrap();
    assert_eq!(after.string("returning"), Some("ret"));
}

#[test]
fn test_syntax_errors_are_flagged_not_fatal() {
    let unit = parse("package com.acme; public class Broken { public void a( }");
    assert!(unit.has_syntax_errors);
}
