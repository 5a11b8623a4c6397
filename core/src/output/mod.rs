//! Replay program generation
//!
//! Renders a finished recording into one self-contained HTML page:
//!
//! 1. the payload decoder and the declaration of the payload array
//! 2. persistent variables, declared at script top level
//! 3. `initialize()`, with its own locals and the initialization statements
//! 4. one `fN()` routine per recorded frame
//! 5. the frame driver
//! 6. the encoded payloads, decoded into the payload array on load
//!
//! This is pure text assembly and cannot fail.

mod template;

use gpurec_shared::encoding;

use crate::config::RecorderConfig;
use crate::recorder::{BinaryCache, FrameLog, Scope, Section, VariableScopes};
use crate::serialize::{CACHE_ARRAY, cache_reference};
use crate::surface::SURFACE_ELEMENT_ID;

const INDENT: &str = "    ";

/// Name of the routine replaying frame `index`
pub fn frame_routine(index: usize) -> String {
    format!("f{index}")
}

/// Render the replay program for a finished recording
pub fn generate(
    config: &RecorderConfig,
    log: &FrameLog,
    scopes: &VariableScopes,
    cache: &BinaryCache,
) -> String {
    let mut script = String::new();

    script.push_str(template::DECODE_ROUTINE);
    script.push_str("\n\n");
    script.push_str(&format!("const {CACHE_ARRAY} = new Array({});\n", cache.len()));
    if !scopes.persistent().is_empty() {
        script.push_str(&format!("let {};\n", scopes.persistent_declarations()));
    }
    script.push('\n');

    push_routine(&mut script, "initialize", scopes, Scope::Init, log.init());
    for (index, frame) in log.frames().iter().enumerate() {
        push_routine(
            &mut script,
            &frame_routine(index),
            scopes,
            Scope::Frame(index),
            frame,
        );
    }

    let routines: Vec<String> = (0..log.frame_count()).map(frame_routine).collect();
    script.push_str(&format!("const frames = [{}];\n\n", routines.join(", ")));
    script.push_str(template::DRIVER);
    script.push_str("\n\n");

    for (index, entry) in cache.entries().iter().enumerate() {
        script.push_str(&format!(
            "{} = decodeBase64(\"{}\", {});\n",
            cache_reference(index),
            encoding::encode(&entry.bytes),
            entry.kind.array_name()
        ));
    }
    script.push_str("\nwindow.addEventListener(\"load\", main);\n");

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         </head>\n\
         <body>\n\
         <canvas id=\"{SURFACE_ELEMENT_ID}\" width=\"{width}\" height=\"{height}\"></canvas>\n\
         <script>\n\
         {script}\
         </script>\n\
         </body>\n\
         </html>\n",
        title = html_text(&config.export),
        width = config.width,
        height = config.height,
    )
}

fn push_routine(
    script: &mut String,
    name: &str,
    scopes: &VariableScopes,
    scope: Scope,
    section: &Section,
) {
    script.push_str(&format!("async function {name}() {{\n"));
    let locals = scopes.local_declarations(scope);
    if !locals.is_empty() {
        script.push_str(&format!("{INDENT}let {locals};\n"));
    }
    for statement in &section.statements {
        script.push_str(INDENT);
        script.push_str(statement);
        script.push('\n');
    }
    script.push_str("}\n\n");
}

fn html_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Payload text of every `D[i] = decodeBase64(...)` line, in index order
#[cfg(test)]
pub(crate) fn embedded_payloads(program: &str) -> Vec<String> {
    program
        .lines()
        .filter_map(|line| {
            let rest = line.split_once("= decodeBase64(\"")?.1;
            Some(rest.split_once('"')?.0.to_string())
        })
        .collect()
}
