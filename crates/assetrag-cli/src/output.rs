//! Terminal output formatting.

use colored::Colorize;
use unicode_width::UnicodeWidthStr;

use assetrag_core::{QueryTemplate, SchemaRegistry};
use assetrag_graph::{BuildReport, GraphStats, LoadReport};

/// Print the counts of one loader run.
pub fn print_load_report(type_name: &str, report: &LoadReport) {
    println!("{} {}", "Loaded".green().bold(), type_name.cyan());
    print_report_line(report);
}

fn print_report_line(report: &LoadReport) {
    println!(
        "  loaded {}  invalid {}  misses {}  failed {}  linked {}",
        report.loaded.to_string().green(),
        colored_count(report.invalid),
        colored_count(report.misses),
        colored_count(report.failed),
        report.linked
    );
}

fn colored_count(n: usize) -> colored::ColoredString {
    if n == 0 {
        n.to_string().dimmed()
    } else {
        n.to_string().yellow()
    }
}

/// Print a full build report.
pub fn print_build_report(report: &BuildReport) {
    let width = report
        .nodes
        .keys()
        .chain(report.relationships.keys())
        .map(|k| UnicodeWidthStr::width(k.as_str()))
        .max()
        .unwrap_or(0)
        .max(12);

    println!("\n{} {}", "Build".bold(), report.run_id.to_string().dimmed());
    println!("{}", "─".repeat(term_width().min(72)));
    println!("  Schema statements: {}", report.schema_statements);

    for (title, section) in [("Nodes", &report.nodes), ("Relationships", &report.relationships)] {
        if section.is_empty() {
            continue;
        }
        println!("\n{}", title.bold());
        for (name, load) in section {
            print!("  {} ", pad_right(name, width).cyan());
            print_report_line(load);
        }
    }

    if !report.failures.is_empty() {
        println!("\n{}", "Skipped sources".red().bold());
        for failure in &report.failures {
            println!(
                "  {} {} {}",
                failure.type_name.yellow(),
                failure.path.display().to_string().dimmed(),
                failure.error
            );
        }
    }

    let elapsed = report.finished_at - report.started_at;
    println!(
        "\n{} {} nodes, {} relationships in {:.1}s",
        "Build complete:".green().bold(),
        report.stats.total_nodes(),
        report.stats.total_edges,
        elapsed.num_milliseconds() as f64 / 1000.0
    );
}

/// Print node and relationship counts.
pub fn print_stats(stats: &GraphStats) {
    println!("{}", "Knowledge Graph Status".bold());
    println!("{}", "─".repeat(40));

    for (label, count) in &stats.nodes {
        println!("  {} {}", pad_right(label, 24), count.to_string().cyan());
    }
    println!("  {} {}", pad_right("Nodes", 24).bold(), stats.total_nodes().to_string().cyan());
    println!();
    for (edge, count) in &stats.edges {
        println!("  {} {}", pad_right(edge, 24), count.to_string().cyan());
    }
    println!("  {} {}", pad_right("Relationships", 24).bold(), stats.total_edges.to_string().cyan());

    println!("{}", "─".repeat(40));
}

/// Print the registry followed by the DDL it produces.
pub fn print_schema(registry: &SchemaRegistry, constraints: &[String], indexes: &[String]) {
    println!("{}", "Node types".bold());
    for node in registry.nodes() {
        let properties: Vec<&str> = node.properties.iter().map(|p| p.name.as_str()).collect();
        println!(
            "  {} {} {}",
            pad_right(&node.name, 16).cyan(),
            pad_right(&format!("id={}", node.id_field), 20),
            truncate_visual(&properties.join(", "), term_width().saturating_sub(40).max(20)).dimmed()
        );
    }

    println!("\n{}", "Relationship types".bold());
    for rel in registry.relationships() {
        println!(
            "  {} ({})-[{}]->({})",
            pad_right(&rel.name, 16).cyan(),
            rel.source,
            rel.edge.yellow(),
            rel.target
        );
    }
    for inter in registry.intermediates() {
        println!(
            "  {} ({})-[{}]->({})<-[{}]-({})",
            pad_right(&inter.name, 16).cyan(),
            inter.source,
            inter.source_edge.yellow(),
            inter.label,
            inter.target_edge.yellow(),
            inter.target
        );
    }

    println!("\n{}", "DDL".bold());
    for statement in constraints.iter().chain(indexes) {
        println!("  {}", statement);
    }
}

/// Print a compiled template.
pub fn print_template(template: &QueryTemplate) {
    println!(
        "{} {} {}",
        template.intent.display_name().cyan().bold(),
        "→".dimmed(),
        format!("{:?}", template.shape).yellow()
    );
    println!("{}", "─".repeat(40));
    println!("{}", template.statement.text);

    if !template.statement.params.is_empty() {
        println!();
        println!("{}", "Parameters".bold());
        for (name, value) in &template.statement.params {
            println!("  ${} = {}", name, value);
        }
    }
}

/// Get terminal width, defaulting to 80.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}
