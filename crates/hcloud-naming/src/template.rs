//! Compiled name templates and their rendering context.

use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::lex::lex;
use crate::parse::{Expr, Field, Node, parse};
use crate::value::Value;

/// Values a template can reference as `.GroupId`, `.Seq` and `.Random`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameContext {
    /// Node group the server is created for.
    pub group_id: String,
    /// Position of the server within its group.
    pub seq: String,
    /// Caller-supplied random component.
    pub random: String,
}

impl NameContext {
    pub fn new(group_id: impl Into<String>, seq: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            seq: seq.into(),
            random: String::new(),
        }
    }

    /// Builder method: set the random component.
    pub fn with_random(self, random: impl Into<String>) -> Self {
        Self {
            random: random.into(),
            ..self
        }
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::GroupId => &self.group_id,
            Field::Seq => &self.seq,
            Field::Random => &self.random,
        }
    }
}

/// A compiled server name template.
///
/// Immutable once compiled and cheap to clone. Rendering is pure: the same
/// context always yields the same output.
#[derive(Debug, Clone)]
pub struct NameTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl NameTemplate {
    /// Compile a template. Fails with [`TemplateError::Syntax`] on any
    /// parse, name resolution or static type error.
    pub fn compile(source: &str) -> TemplateResult<Self> {
        let nodes = parse(lex(source)?)?;
        debug!(template = %source, "name template compiled");
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// The source this template was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template against `ctx`.
    pub fn render(&self, ctx: &NameContext) -> TemplateResult<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, ctx, &mut out).map_err(TemplateError::Render)?;
        Ok(out)
    }
}

fn render_nodes(nodes: &[Node], ctx: &NameContext, out: &mut String) -> Result<(), String> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Print(expr) => out.push_str(&eval(expr, ctx)?.to_string()),
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if eval(cond, ctx)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, ctx, out)?;
            }
        }
    }
    Ok(())
}

fn eval(expr: &Expr, ctx: &NameContext) -> Result<Value, String> {
    match expr {
        Expr::Lit(value) => Ok(value.clone()),
        Expr::Field(field) => Ok(Value::Str(ctx.field(*field).to_string())),
        // `and` / `or` stop evaluating once the result is known.
        Expr::Call { func, args } if func.name == "and" || func.name == "or" => {
            let want = func.name == "or";
            let mut last = None;
            for arg in args {
                let value = eval(arg, ctx)?;
                if value.is_truthy() == want {
                    return Ok(value);
                }
                last = Some(value);
            }
            last.ok_or_else(|| format!("{}: at least 1 arg required", func.name))
        }
        Expr::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            (func.call)(&values).map_err(|e| format!("{}: {e}", func.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str, ctx: &NameContext) -> String {
        NameTemplate::compile(src).unwrap().render(ctx).unwrap()
    }

    fn ctx() -> NameContext {
        NameContext::new("pool1", "7").with_random("a1b2c3d4")
    }

    #[test]
    fn upper_cases_group_and_appends_seq() {
        assert_eq!(render("{{toUpper .GroupId}}-{{.Seq}}", &ctx()), "POOL1-7");
    }

    #[test]
    fn rendering_is_deterministic() {
        let tpl = NameTemplate::compile(r#"{{ replace .GroupId "o" "0" -1 }}-{{ .Random }}"#).unwrap();
        let first = tpl.render(&ctx()).unwrap();
        for _ in 0..10 {
            assert_eq!(tpl.render(&ctx()).unwrap(), first);
        }
        assert_eq!(first, "p00l1-a1b2c3d4");
    }

    #[test]
    fn conditionals_pick_a_branch() {
        let src = r#"{{if hasPrefix .GroupId "gpu"}}g{{else if eq .Seq "7"}}seven{{else}}n{{end}}-{{.Seq}}"#;
        assert_eq!(render(src, &ctx()), "seven-7");
        assert_eq!(render(src, &NameContext::new("gpu-a", "1")), "g-1");
        assert_eq!(render(src, &NameContext::new("cpu", "1")), "n-1");
    }

    #[test]
    fn non_string_values_print_like_go() {
        assert_eq!(render(r#"{{ split "a-b" "-" }}"#, &ctx()), "[a b]");
        assert_eq!(render(r#"{{ contains .GroupId "pool" }}"#, &ctx()), "true");
        assert_eq!(render(r#"{{ len .Random }}"#, &ctx()), "8");
    }

    #[test]
    fn parenthesized_pipelines() {
        assert_eq!(
            render(r#"{{ join (split (toUpper .GroupId) "O") "_" }}"#, &ctx()),
            "P__L1"
        );
    }

    #[test]
    fn trimming_removes_template_whitespace() {
        assert_eq!(render("{{- .GroupId }}  \n  {{- .Seq -}}  \n", &ctx()), "pool17");
    }

    #[test]
    fn value_errors_surface_at_render_time() {
        let tpl = NameTemplate::compile(r#"{{ repeat .GroupId -1 }}"#).unwrap();
        assert!(matches!(tpl.render(&ctx()), Err(TemplateError::Render(_))));

        let tpl = NameTemplate::compile(r#"{{ index (split .GroupId "-") 3 }}"#).unwrap();
        assert!(matches!(tpl.render(&ctx()), Err(TemplateError::Render(_))));
    }

    #[test]
    fn and_short_circuits() {
        // The second operand would fail; `and` never evaluates it.
        let tpl = NameTemplate::compile(r#"{{ and "" (repeat "x" -1) }}-x"#).unwrap();
        assert_eq!(tpl.render(&ctx()).unwrap(), "-x");
    }

    #[test]
    fn compile_keeps_source() {
        let tpl = NameTemplate::compile("{{.Seq}}").unwrap();
        assert_eq!(tpl.source(), "{{.Seq}}");
    }
}
