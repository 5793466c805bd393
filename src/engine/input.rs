use crate::options::RenderOptions;

/// Name of the virtual input file the engine is pointed at.
pub const INPUT_FILE: &str = "input.tex";
/// Name of the raw output file read back after a run.
pub const OUTPUT_FILE: &str = "input.dvi";
/// Terminal input fed to the engine: compile the input file, then stop.
pub const TERMINAL_INPUT: &str = "input.tex\n\\end\n";

/// Build the complete engine input document for one request.
///
/// Order is fixed: package directives, the library directive, raw preamble additions, then the
/// source wrapped in a document environment.
pub fn synthesize_input(source: &str, options: &RenderOptions) -> String {
    let mut out = String::new();
    for pkg in &options.packages {
        out.push_str("\\usepackage");
        if let Some(opts) = &pkg.options {
            out.push('[');
            out.push_str(opts);
            out.push(']');
        }
        out.push('{');
        out.push_str(&pkg.name);
        out.push('}');
    }
    if let Some(libs) = &options.libraries {
        out.push_str("\\usetikzlibrary{");
        out.push_str(libs);
        out.push('}');
    }
    if let Some(preamble) = &options.preamble {
        out.push_str(preamble);
    }
    out.push_str("\\begin{document}\n");
    out.push_str(source);
    out.push_str("\n\\end{document}\n");
    out
}

#[cfg(test)]
#[path = "../../tests/unit/engine/input.rs"]
mod tests;
