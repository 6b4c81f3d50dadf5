//! `aop` namespace declarations in Spring XML bean definition files.

use roxmltree::{Document, Node};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::path::Path;
use weavescope_api::{
    AdviceKind, AdviceMethod, AdvisorDeclaration, AspectDefinition, AspectDefinitionSource,
    AutoProxyConfig, BeanDefinition, DefinitionOrigin, Diagnostic, DiagnosticKind, Introduction,
    ParsedAspects, ResultBinding,
};

pub const AOP_NAMESPACE: &str = "http://www.springframework.org/schema/aop";
pub const BEANS_NAMESPACE: &str = "http://www.springframework.org/schema/beans";

/// Prefixes bound on behalf of fragments that use them undeclared.
const IMPLIED_PREFIXES: &[&str] = &["aop", "beans"];

/// Elements of the `aop` namespace, dispatched by local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AopElement {
    Config,
    Aspect,
    Advisor,
    Pointcut,
    Advice(AdviceKind),
    AspectjAutoproxy,
    Include,
    Other,
}

impl AopElement {
    pub fn from_local_name(name: &str) -> Self {
        match name {
            "config" => AopElement::Config,
            "aspect" => AopElement::Aspect,
            "advisor" => AopElement::Advisor,
            "pointcut" => AopElement::Pointcut,
            "aspectj-autoproxy" => AopElement::AspectjAutoproxy,
            "include" => AopElement::Include,
            other => AdviceKind::from_xml_element(other)
                .map(AopElement::Advice)
                .unwrap_or(AopElement::Other),
        }
    }

    /// `None` for elements outside the `aop` namespace.
    pub fn of(node: Node) -> Option<Self> {
        if !node.is_element() || node.tag_name().namespace() != Some(AOP_NAMESPACE) {
            return None;
        }
        Some(Self::from_local_name(node.tag_name().name()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlAspectSource;

impl AspectDefinitionSource for XmlAspectSource {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "xml")
    }

    fn parse(&self, path: &Path, content: &str) -> ParsedAspects {
        let wrapped: String;
        let parsed = match Document::parse(content) {
            Err(roxmltree::Error::UnknownNamespace(prefix, _))
                if IMPLIED_PREFIXES.contains(&prefix.as_str()) =>
            {
                wrapped = with_implied_namespaces(content);
                Document::parse(&wrapped)
            }
            other => other,
        };
        let doc = match parsed {
            Ok(doc) => doc,
            Err(e) => {
                return ParsedAspects {
                    diagnostics: vec![Diagnostic::error(
                        DiagnosticKind::Parse,
                        path,
                        e.pos().row as usize,
                        format!("Malformed XML: {}", e),
                    )],
                    ..Default::default()
                };
            }
        };
        let mut reader = Reader {
            doc: &doc,
            path,
            out: ParsedAspects::default(),
            ordinal: 0,
            bean_classes: HashMap::new(),
        };
        reader.read();
        reader.out
    }
}

type PointcutScope = HashMap<String, String>;

struct Reader<'a, 'input> {
    doc: &'a Document<'input>,
    path: &'a Path,
    out: ParsedAspects,
    ordinal: usize,
    bean_classes: HashMap<String, String>,
}

impl<'a, 'input> Reader<'a, 'input> {
    fn read(&mut self) {
        let doc = self.doc;
        for node in doc.descendants().filter(|n| is_bean(*n)) {
            self.read_bean(node);
        }
        for node in doc.descendants() {
            match AopElement::of(node) {
                Some(AopElement::Config) => self.read_config(node),
                Some(AopElement::AspectjAutoproxy) => self.read_autoproxy(node),
                _ => {}
            }
        }
    }

    fn lines(&self, node: Node) -> (usize, usize) {
        let range = node.range();
        (
            self.doc.text_pos_at(range.start).row as usize,
            self.doc.text_pos_at(range.end).row as usize,
        )
    }

    fn report(&mut self, node: Node, message: impl Into<String>) {
        let line = self.lines(node).0;
        self.out
            .diagnostics
            .push(Diagnostic::error(DiagnosticKind::Parse, self.path, line, message));
    }

    fn next_ordinal(&mut self) -> usize {
        let ordinal = self.ordinal;
        self.ordinal += 1;
        ordinal
    }

    fn read_bean(&mut self, node: Node) {
        let id = node.attribute("id").map(str::to_string).or_else(|| {
            node.attribute("name").and_then(|names| {
                names
                    .split([',', ';', ' '])
                    .find(|n| !n.is_empty())
                    .map(str::to_string)
            })
        });
        // Anonymous inner beans cannot be referenced by name.
        let Some(id) = id else {
            return;
        };
        let class_name = node.attribute("class").map(|c| c.trim().to_string());
        if let Some(class) = &class_name {
            self.bean_classes.insert(id.clone(), class.clone());
        }
        self.out.beans.push(BeanDefinition {
            id: SmolStr::new(&id),
            class_name: class_name.map(SmolStr::from),
            resource: self.path.to_path_buf(),
            line: self.lines(node).0,
            is_abstract: node.attribute("abstract") == Some("true"),
        });
    }

    fn collect_pointcuts(&mut self, parent: Node, scope: &mut PointcutScope) {
        for child in parent.children() {
            if AopElement::of(child) != Some(AopElement::Pointcut) {
                continue;
            }
            match (child.attribute("id"), child.attribute("expression")) {
                (Some(id), Some(expression)) => {
                    scope.insert(id.to_string(), expression.to_string());
                }
                _ => self.report(child, "<aop:pointcut> requires 'id' and 'expression' attributes"),
            }
        }
    }

    /// `pointcut` attribute, else `pointcut-ref` looked up in `scope`.
    fn pointcut_of(&mut self, node: Node, scope: &PointcutScope) -> Option<String> {
        if let Some(expression) = node.attribute("pointcut") {
            return Some(expression.to_string());
        }
        match node.attribute("pointcut-ref") {
            Some(reference) => match scope.get(reference) {
                Some(expression) => Some(expression.clone()),
                None => {
                    let message = format!("Pointcut reference '{}' cannot be resolved", reference);
                    self.report(node, message);
                    None
                }
            },
            None => {
                self.report(node, "Either 'pointcut' or 'pointcut-ref' must be specified");
                None
            }
        }
    }

    fn read_config(&mut self, node: Node) {
        let proxy_target_class = node.attribute("proxy-target-class") == Some("true");
        let mut scope = PointcutScope::new();
        self.collect_pointcuts(node, &mut scope);

        for child in node.children() {
            match AopElement::of(child) {
                Some(AopElement::Aspect) => self.read_aspect(child, proxy_target_class, &scope),
                Some(AopElement::Advisor) => self.read_advisor(child, proxy_target_class, &scope),
                _ => {}
            }
        }
    }

    fn read_aspect(&mut self, node: Node, proxy_target_class: bool, config_scope: &PointcutScope) {
        let mut scope = config_scope.clone();
        self.collect_pointcuts(node, &mut scope);

        let aspect_name = node.attribute("ref").map(str::to_string);
        let aspect_class = aspect_name
            .as_ref()
            .and_then(|r| self.bean_classes.get(r))
            .cloned();

        for child in node.children() {
            let Some(AopElement::Advice(kind)) = AopElement::of(child) else {
                continue;
            };
            if kind.is_introduction() {
                self.read_declare_parents(child, aspect_name.as_deref(), proxy_target_class);
                continue;
            }
            let Some(aspect_name) = aspect_name.as_deref() else {
                self.report(node, "<aop:aspect> declaring advice requires a 'ref' attribute");
                break;
            };
            self.read_advice(
                child,
                kind,
                aspect_name,
                aspect_class.as_deref(),
                proxy_target_class,
                &scope,
            );
        }
    }

    fn read_advice(
        &mut self,
        node: Node,
        kind: AdviceKind,
        aspect_name: &str,
        aspect_class: Option<&str>,
        proxy_target_class: bool,
        scope: &PointcutScope,
    ) {
        let Some(method) = node.attribute("method") else {
            let message = format!("<aop:{}> requires a 'method' attribute", node.tag_name().name());
            self.report(node, message);
            return;
        };
        let Some(pointcut) = self.pointcut_of(node, scope) else {
            return;
        };
        let arg_names = node
            .attribute("arg-names")
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(SmolStr::new)
                    .collect()
            })
            .unwrap_or_default();
        let binding = match (node.attribute("returning"), node.attribute("throwing")) {
            (Some(r), _) => ResultBinding::Returning(SmolStr::new(r)),
            (_, Some(t)) => ResultBinding::Throwing(SmolStr::new(t)),
            _ => ResultBinding::None,
        };
        let (start, end) = self.lines(node);
        let ordinal = self.next_ordinal();

        let result = AspectDefinition::builder(kind, DefinitionOrigin::Xml, self.path)
            .ordinal(ordinal)
            .aspect_name(Some(aspect_name))
            .aspect_class_name(aspect_class)
            .advice_method(AdviceMethod::named(method))
            .pointcut(pointcut)
            .arg_names(arg_names)
            .binding(binding)
            .proxy_target_class(proxy_target_class)
            .lines(start, end)
            .build();
        match result {
            Ok(def) => self.out.definitions.push(def),
            Err(e) => self.report(node, e.to_string()),
        }
    }

    fn read_declare_parents(
        &mut self,
        node: Node,
        aspect_name: Option<&str>,
        proxy_target_class: bool,
    ) {
        let (Some(types_matching), Some(implement_interface)) =
            (node.attribute("types-matching"), node.attribute("implement-interface"))
        else {
            self.report(
                node,
                "<aop:declare-parents> requires 'types-matching' and \
                 'implement-interface' attributes",
            );
            return;
        };
        let default_impl = node.attribute("default-impl").map(str::to_string).or_else(|| {
            node.attribute("delegate-ref")
                .and_then(|r| self.bean_classes.get(r).cloned())
        });
        let (start, end) = self.lines(node);
        let ordinal = self.next_ordinal();

        let builder =
            AspectDefinition::builder(AdviceKind::DeclareParents, DefinitionOrigin::Xml, self.path);
        let result = builder
            .ordinal(ordinal)
            .aspect_name(aspect_name)
            .aspect_class_name(default_impl.clone())
            .introduction(Introduction {
                types_matching: SmolStr::new(types_matching),
                implement_interface: SmolStr::new(implement_interface),
                default_impl: default_impl.map(SmolStr::from),
                defining_field: None,
            })
            .proxy_target_class(proxy_target_class)
            .lines(start, end)
            .build();
        match result {
            Ok(def) => self.out.definitions.push(def),
            Err(e) => self.report(node, e.to_string()),
        }
    }

    fn read_advisor(&mut self, node: Node, proxy_target_class: bool, scope: &PointcutScope) {
        let Some(advice_ref) = node.attribute("advice-ref") else {
            self.report(node, "<aop:advisor> requires an 'advice-ref' attribute");
            return;
        };
        let Some(pointcut) = self.pointcut_of(node, scope) else {
            return;
        };
        let (start_line, end_line) = self.lines(node);
        let ordinal = self.next_ordinal();
        self.out.advisors.push(AdvisorDeclaration {
            advice_ref: SmolStr::new(advice_ref),
            pointcut: SmolStr::from(pointcut),
            proxy_target_class,
            resource: self.path.to_path_buf(),
            ordinal,
            start_line,
            end_line,
        });
    }

    fn read_autoproxy(&mut self, node: Node) {
        let mut include_patterns = Vec::new();
        for include in node
            .children()
            .filter(|c| AopElement::of(*c) == Some(AopElement::Include))
        {
            let Some(name) = include.attribute("name") else {
                continue;
            };
            match regex::Regex::new(name) {
                Ok(_) => include_patterns.push(name.to_string()),
                Err(e) => {
                    self.report(include, format!("Invalid include pattern '{}': {}", name, e))
                }
            }
        }
        let config = AutoProxyConfig {
            proxy_target_class: node.attribute("proxy-target-class") == Some("true"),
            include_patterns,
        };
        self.out
            .auto_proxy
            .get_or_insert_with(AutoProxyConfig::default)
            .merge(&config);
    }
}

/// Encloses `content` in a `beans` root binding the default and `aop`
/// namespaces. The root opens on the first line so line numbers stay put.
fn with_implied_namespaces(content: &str) -> String {
    let split = if content.trim_start().starts_with("<?xml") {
        content.find("?>").map(|i| i + 2).unwrap_or(0)
    } else {
        0
    };
    let (prolog, body) = content.split_at(split);
    format!(
        "{}<beans xmlns=\"{}\" xmlns:beans=\"{}\" xmlns:aop=\"{}\">{}</beans>",
        prolog, BEANS_NAMESPACE, BEANS_NAMESPACE, AOP_NAMESPACE, body
    )
}

fn is_bean(node: Node) -> bool {
    node.is_element()
        && node.tag_name().name() == "bean"
        && matches!(node.tag_name().namespace(), None | Some(BEANS_NAMESPACE))
}
