use std::io::{stderr, stdin, stdout, Write};
use std::path::PathBuf;

use clap::Parser;

use classgraph_core::{ClassTypeMask, ClasspathToken, Error, FQName, InterruptHandle, RelType};
use classgraph_spec::ScanSpec;

#[derive(Debug, Parser)]
struct CliArgs {
    /// Classpath tokens to scan: directories, jars, or `outer.jar!/inner.jar`
    /// nested-archive notation.
    classpath: Vec<String>,

    /// Scan-spec tokens: package/class allow/deny entries, `jar:`/`dir:`
    /// prefixed archive filters, or `!`/`!!` to relax system denial.
    #[arg(short = 's', long = "spec")]
    spec_tokens: Vec<String>,

    #[arg(long, default_value_t = 4)]
    threads: usize,
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();
    let args = CliArgs::parse();

    let spec = ScanSpec::builder().tokens(args.spec_tokens).build();
    let tokens = args.classpath.iter().cloned().map(ClasspathToken::new).collect();
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    println!("classpath: {:?}", args.classpath);
    let result = classgraph_core::scan(spec, tokens, base_dir, args.threads, InterruptHandle::new())?;

    println!(
        "scanned {} classpath element(s), {} class(es), {} deferred error(s)",
        result.elements.len(),
        result.graph.len(),
        result.deferred_errors.len()
    );
    for err in &result.deferred_errors {
        eprintln!("warning: {err}");
    }
    println!();
    println!("Discover information about a class by typing its fully qualified name. Specific");
    println!("relationships can be discovered by appending :subclasses, :interfaces,");
    println!("or :annotations to the name. Type 'quit' or 'exit' to leave.");

    let mut lines = stdin().lines();
    loop {
        print!("> ");
        stdout().flush().map_err(classgraph_core::ErrorKind::from)?;
        let Some(line) = lines.next() else { break };
        let line = line.map_err(classgraph_core::ErrorKind::from)?;
        let line = line.replace('.', "/");
        if line == "quit" || line == "exit" {
            break;
        }

        let (class, target) = match line.split_once(':') {
            Some((left, right)) => (left, Some(right)),
            None => (line.as_str(), None),
        };
        let name = FQName::new(class);

        let Some(info) = result.graph.get(name) else {
            println!("no such class: {class}");
            continue;
        };

        match target {
            None => println!("{info:#?}"),
            Some("subclasses") => print_names(info.subclass_names().iter().map(|n| n.source_form())),
            Some("interfaces") => print_names(info.interface_names().iter().map(|n| n.source_form())),
            Some("annotations") => print_names(
                result
                    .graph
                    .related(name, RelType::ClassAnnotation)
                    .into_iter()
                    .map(|c| c.name.source_form()),
            ),
            Some("reachable-subclasses") => {
                match result.graph.reachable(name, RelType::Subclass, ClassTypeMask::All, false) {
                    Ok(hits) => print_names(hits.into_iter().map(|c| c.name.source_form())),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Some(other) => println!("unrecognized suffix ':{other}'"),
        }
    }

    let _ = stderr().flush();
    Ok(())
}

fn print_names(names: impl Iterator<Item = String>) {
    let mut any = false;
    for name in names {
        println!("{name}");
        any = true;
    }
    if !any {
        println!("(none)");
    }
}
