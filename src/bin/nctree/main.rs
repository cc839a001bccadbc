//! nctree CLI - Tool for inspecting, copying and truncating nctree datasets.

use std::env;
use std::path::Path;

use nctree::core::IndexSelection;
use nctree::{
    truncate, Dataset, DuplicateOptions, Duplicator, Error, FormatOptions, Group, Truncation,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        // Info command - show dataset summary
        "info" | "i" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: nctree info <file>");
                std::process::exit(1);
            }
            cmd_info(filtered_args[1]);
        }

        // Tree command - show group hierarchy
        "tree" | "t" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: nctree tree <file>");
                std::process::exit(1);
            }
            cmd_tree(filtered_args[1]);
        }

        // Dump command - full listing
        "dump" | "d" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: nctree dump <file> [--json]");
                std::process::exit(1);
            }
            let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
            cmd_dump(filtered_args[1], json_mode);
        }

        // Copy command - whole-dataset copy with optional selections
        "copy" | "c" => {
            let positional: Vec<&str> = positional(&filtered_args[1..]);
            if positional.len() < 2 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: nctree copy <in> <out> [--select dim=1,3,5-7]... [--compact]");
                std::process::exit(1);
            }
            let options = match parse_selections(&filtered_args[1..]) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            cmd_copy(positional[0], positional[1], &options, format_options(&filtered_args));
        }

        // Truncate command - copy while dropping trailing positions
        "truncate" | "tr" => {
            let positional: Vec<&str> = positional(&filtered_args[1..]);
            if positional.len() < 5 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: nctree truncate <in> <out> <group> <dim> <ndrop> [--compact]");
                std::process::exit(1);
            }
            let drop: usize = match positional[4].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: ndrop must be a non-negative integer, got '{}'", positional[4]);
                    std::process::exit(1);
                }
            };
            let truncation = Truncation::new(positional[2], positional[3], drop);
            cmd_truncate(positional[0], positional[1], &truncation, format_options(&filtered_args));
        }

        // Help
        "help" | "h" | "-h" | "--help" => print_help(),

        // Default: if file exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0]);
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_help() {
    println!("nctree - hierarchical array dataset toolkit");
    println!();
    println!("USAGE:");
    println!("    nctree [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info     <file>                          Show dataset summary");
    println!("    t, tree     <file>                          Show group hierarchy");
    println!("    d, dump     <file> [--json]                 Dump dimensions, variables, attributes");
    println!("    c, copy     <in> <out> [--select d=1,2]...  Copy, keeping selected positions");
    println!("    tr, truncate <in> <out> <group> <dim> <n>   Copy, dropping the last n positions of dim");
    println!("    h, help                                     Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    --compact        Write compact JSON without provenance (copy, truncate)");
    println!();
    println!("EXAMPLES:");
    println!("    nctree info obs.nct");
    println!("    nctree dump obs.nct --json");
    println!("    nctree copy obs.nct sub.nct --select time=2,4,6");
    println!("    nctree truncate obs.nct short.nct / time 3");
    println!();
    println!("NOTES:");
    println!("    - Passing a file directly is equivalent to 'info'");
    println!("    - RUST_LOG overrides the verbosity flags");
    println!("    - Selection indices are 1-based");
}

fn open_or_exit(path: &str) -> Dataset {
    match Dataset::open(path, false) {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct Counts {
    groups: usize,
    dimensions: usize,
    real: usize,
    complex: usize,
}

fn count(group: &Group, counts: &mut Counts) {
    counts.groups += 1;
    counts.dimensions += group.own_dimensions().len();
    for var in group.variables() {
        if var.is_complex() {
            counts.complex += 1;
        } else {
            counts.real += 1;
        }
    }
    for child in group.children() {
        count(&child, counts);
    }
}

fn cmd_info(path: &str) {
    let ds = open_or_exit(path);
    let root = ds.root();

    println!("Dataset: {}", path);
    if let Some(library) = root
        .attribute(nctree::Attributes::PROVENANCE_KEY)
        .and_then(|v| v.as_str().map(str::to_string))
    {
        println!("Written by: {}", library);
    }
    println!();

    let mut counts = Counts::default();
    count(root, &mut counts);
    println!("Groups:     {}", counts.groups);
    println!("Dimensions: {}", counts.dimensions);
    println!("Variables:  {} ({} complex)", counts.real + counts.complex, counts.complex);

    let growable: Vec<String> = root
        .dimensions()
        .iter()
        .filter(|d| d.is_growable())
        .map(|d| format!("{} ({})", d.name(), d.len()))
        .collect();
    if !growable.is_empty() {
        println!("Growable:   {}", growable.join(", "));
    }
    close_quietly(&ds);
}

fn cmd_tree(path: &str) {
    let ds = open_or_exit(path);
    println!("Dataset: {}", path);
    println!();
    print_tree(ds.root(), 0);
    close_quietly(&ds);
}

fn print_tree(group: &Group, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = if group.is_root() { "/" } else { group.name() };
    let vars = group.variables();
    println!(
        "{}{} [{} dims, {} vars]",
        indent,
        label,
        group.own_dimensions().len(),
        vars.len()
    );
    for var in &vars {
        println!("{}  - {} {}{}", indent, var.scalar_type(), var.name(), var.shape());
    }
    for child in group.children() {
        print_tree(&child, depth + 1);
    }
}

fn cmd_dump(path: &str, json_mode: bool) {
    let ds = open_or_exit(path);
    if json_mode {
        match serde_json::to_string_pretty(&ds.root().summary()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to encode summary: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", ds.root().dump());
    }
    close_quietly(&ds);
}

fn cmd_copy(input: &str, output: &str, options: &DuplicateOptions, format: FormatOptions) {
    tracing::info!("copying {} -> {}", input, output);
    let source = open_or_exit(input);
    let duplicator = match Duplicator::new(source.root(), options) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid copy request: {}", e);
            std::process::exit(1);
        }
    };
    let dest = match Dataset::create(output, format) {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("Failed to create {}: {}", output, e);
            std::process::exit(1);
        }
    };

    match duplicator.copy_into(dest.root()) {
        Ok(report) => {
            if let Err(e) = dest.close() {
                eprintln!("Failed to write {}: {}", output, e);
                std::process::exit(1);
            }
            println!(
                "Copied {} -> {} ({} groups, {} variables, {} values)",
                input, output, report.groups, report.variables, report.values_written
            );
        }
        Err(e) => {
            report_copy_failure(&e);
            if matches!(e, Error::IncompleteCopy { .. }) {
                let _ = dest.close();
            } else {
                let _ = dest.discard();
            }
            std::process::exit(1);
        }
    }
    close_quietly(&source);
}

fn cmd_truncate(input: &str, output: &str, truncation: &Truncation, format: FormatOptions) {
    match truncate(input, output, truncation, format) {
        Ok(report) => println!(
            "Truncated {} -> {} ({} arrays, {} values)",
            input, output, report.arrays_written, report.values_written
        ),
        Err(e) => {
            report_copy_failure(&e);
            std::process::exit(1);
        }
    }
}

fn report_copy_failure(e: &Error) {
    eprintln!("Copy failed: {}", e);
    if let Error::IncompleteCopy { failed, .. } = e {
        for path in failed {
            eprintln!("  not copied: {}", path);
        }
    }
}

fn close_quietly(ds: &Dataset) {
    if let Err(e) = ds.close() {
        tracing::warn!("close failed: {}", e);
    }
}

/// Arguments that are neither flags nor values of `--select`.
fn positional<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        match arg {
            "--select" | "-s" => {
                iter.next();
            }
            a if a.starts_with("--") => {}
            a => out.push(a),
        }
    }
    out
}

/// Collect `--select dim=1,3,5-7` pairs.
fn parse_selections(args: &[&str]) -> Result<DuplicateOptions, Error> {
    let mut options = DuplicateOptions::new();
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        if arg != "--select" && arg != "-s" {
            continue;
        }
        let Some(&pair) = iter.next() else {
            return Err(Error::InvalidTruncation("--select needs dim=indices".to_string()));
        };
        let Some((dim, list)) = pair.split_once('=') else {
            return Err(Error::InvalidTruncation(format!(
                "bad selection '{}', expected dim=indices",
                pair
            )));
        };
        options = options.select(dim.trim(), IndexSelection::parse(list)?);
    }
    Ok(options)
}

fn format_options(args: &[&str]) -> FormatOptions {
    if args.contains(&"--compact") {
        FormatOptions::compact()
    } else {
        FormatOptions::default()
    }
}
