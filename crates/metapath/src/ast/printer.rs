use super::{Expr, ExprVisitor};

/// Renders an expression tree as one indented line per node.
///
/// The context is the current depth. Every per-kind method falls through to
/// `visit_children`, so the printer only hooks that.
#[derive(Debug)]
pub struct AstPrinter {
    indent: &'static str,
}

impl Default for AstPrinter {
    fn default() -> Self {
        Self::with_indent("  ")
    }
}

impl AstPrinter {
    /// `indent` is repeated once per level of depth.
    pub fn with_indent(indent: &'static str) -> Self {
        Self { indent }
    }

    /// Render with the default two-space indent.
    pub fn print(expr: &Expr) -> String {
        AstPrinter::default().render(expr)
    }

    pub fn render(&mut self, expr: &Expr) -> String {
        expr.accept(self, &0)
    }
}

impl ExprVisitor<usize> for AstPrinter {
    type Output = String;

    fn default_result(&mut self) -> String {
        String::new()
    }

    fn visit_children(&mut self, expr: &Expr, depth: &usize) -> String {
        let mut out = self.indent.repeat(*depth);
        out.push_str(&expr.label());
        out.push('\n');
        for child in expr.children() {
            out.push_str(&child.accept(self, &(depth + 1)));
        }
        out
    }
}
