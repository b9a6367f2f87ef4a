use clap::Parser;

use rel_bdd::context::{Context, ContextConfig};
use rel_bdd::relation::Relation;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of elements of the carrier set.
    #[arg(value_name = "INT", default_value = "12")]
    n: u64,

    /// Probability that an edge is present.
    #[clap(long, value_name = "FLOAT", default_value = "0.15")]
    density: f64,

    /// Seed of the random generator.
    #[clap(long, value_name = "INT")]
    seed: Option<u64>,

    /// Node store size (in bits, so the actual size is `2^size` nodes).
    #[clap(long, value_name = "INT", default_value = "20")]
    size: usize,

    /// Print the relations.
    #[clap(long)]
    show: bool,
}

/// Reflexive-transitive closure by squaring until a fixpoint is reached.
fn closure<'ctx>(r: &Relation<'ctx>) -> color_eyre::Result<Relation<'ctx>> {
    let mut current = r.join(&r.identity_like()?)?;
    loop {
        let next = current.composition(&current)?;
        if next == current {
            return Ok(current);
        }
        current = next;
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut config = ContextConfig::default().with_storage_bits(args.size);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    let ctx = Context::with_config(config);
    println!("ctx = {:?}", ctx);

    let mut graph = ctx.relation(args.n, args.n)?;
    graph.random(args.density)?;
    println!("graph: {} edges, {} nodes", graph.count(), graph.size());
    if args.show {
        print!("{}", graph);
    }

    let reach = closure(&graph)?;
    println!("closure: {} pairs, {} nodes", reach.count(), reach.size());
    if args.show {
        print!("{}", reach);
    }

    // Mutually reachable pairs form an equivalence relation.
    let scc = reach.meet(&reach.transpose()?)?;
    println!("strongly connected pairs: {}", scc.count());
    assert!(scc.transpose()? == scc);
    assert!(ctx.identity(args.n)?.is_subset(&scc)?);

    // Elements reachable from element 0.
    let source = ctx.vector(args.n, args.n, 0)?;
    let from_source = source.composition(&reach)?;
    let reachable: Vec<usize> = from_source.row(0)?.iter().enumerate().filter(|&(_, &b)| b).map(|(i, _)| i).collect();
    println!("reachable from 0: {:?}", reachable);

    drop(from_source);
    drop(source);
    let freed = ctx.collect();
    let (hits, misses, entries) = ctx.cache_stats();
    println!(
        "freed {} nodes, {} alive, cache: {} entries, {} hits, {} misses",
        freed,
        ctx.live_nodes(),
        entries,
        hits,
        misses
    );

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
