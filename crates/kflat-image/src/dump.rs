//! Human-readable image dump for debugging and tests.

use std::fmt::Write as _;

use super::colors::Colors;
use super::image::{Image, NodesView};

/// Generate a human-readable dump of an image.
///
/// Offsets are hexadecimal and relative to the data section; `N<i>+<d>`
/// names the node containing an offset and the distance into it.
pub fn dump(image: &Image, colors: Colors) -> String {
    let mut out = String::new();
    let ctx = DumpContext::new(image, colors);

    dump_header(&mut out, image);
    dump_roots(&mut out, image, &ctx);
    dump_nodes(&mut out, image, &ctx);
    dump_fixups(&mut out, image, &ctx);

    out
}

/// Calculate the minimum width needed to display numbers up to `count - 1`.
fn width_for_count(count: usize) -> usize {
    if count <= 1 {
        1
    } else {
        (count - 1).ilog10() as usize + 1
    }
}

struct DumpContext<'a> {
    nodes: NodesView<'a>,
    colors: Colors,
    node_width: usize,
    root_width: usize,
}

impl<'a> DumpContext<'a> {
    fn new(image: &'a Image, colors: Colors) -> Self {
        let header = image.header();
        Self {
            nodes: image.nodes(),
            colors,
            node_width: width_for_count(header.node_count as usize),
            root_width: width_for_count(header.root_count as usize),
        }
    }

    /// `@0018 N1+0` for an offset inside a node, `@0018` otherwise.
    fn location(&self, offset: u64) -> String {
        match self.nodes.containing(offset) {
            Some((idx, node)) => format!(
                "@{offset:04x} N{idx:0w$}+{}",
                offset - node.offset,
                w = self.node_width
            ),
            None => format!("@{offset:04x}"),
        }
    }

    fn target(&self, target: Option<u64>) -> String {
        let c = &self.colors;
        match target {
            Some(offset) => format!("{}{}{}", c.target, self.location(offset), c.reset),
            None => format!("{}null{}", c.muted, c.reset),
        }
    }
}

fn dump_header(out: &mut String, image: &Image) {
    let header = image.header();
    out.push_str("[header]\n");
    writeln!(out, "version = {}", header.version).unwrap();
    writeln!(out, "size = {}", header.total_size).unwrap();
    writeln!(out, "data = {}", header.data_size).unwrap();
    writeln!(out, "tagged = {}", header.is_tagged()).unwrap();
    out.push('\n');
}

fn dump_roots(out: &mut String, image: &Image, ctx: &DumpContext<'_>) {
    let c = &ctx.colors;
    out.push_str("[roots]\n");
    for (idx, root) in image.roots().iter().enumerate() {
        writeln!(
            out,
            "R{idx:0w$} {}{}{}: {} -> {}",
            c.root,
            root.name,
            c.reset,
            root.type_name,
            ctx.target(root.target),
            w = ctx.root_width
        )
        .unwrap();
    }
    out.push('\n');
}

fn dump_nodes(out: &mut String, image: &Image, ctx: &DumpContext<'_>) {
    let c = &ctx.colors;
    out.push_str("[nodes]\n");
    for (idx, node) in image.nodes().iter().enumerate() {
        writeln!(
            out,
            "N{idx:0w$} {}@{:04x}{} +{}",
            c.muted,
            node.offset,
            c.reset,
            node.size,
            w = ctx.node_width
        )
        .unwrap();
    }
    out.push('\n');
}

fn dump_fixups(out: &mut String, image: &Image, ctx: &DumpContext<'_>) {
    let c = &ctx.colors;
    out.push_str("[fixups]\n");
    for fixup in image.fixups().iter() {
        write!(
            out,
            "{} -> {}",
            ctx.location(fixup.slot),
            ctx.target(fixup.target)
        )
        .unwrap();
        if fixup.tag != 0 {
            write!(out, " | {}{:#x}{}", c.tag, fixup.tag, c.reset).unwrap();
        }
        out.push('\n');
    }
}
