use std::collections::hash_map::RandomState;

use chain_hash::HashMap;
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    /// Number of entries to insert.
    #[arg(short = 'n', long = "entries", default_value_t = 1000)]
    entries: usize,

    /// Initial bucket count, rounded up to a power of two.
    #[arg(short = 'c', long = "initial_capacity", default_value_t = 16)]
    initial_capacity: usize,

    /// Remove every other entry after filling.
    #[arg(short = 'r', long = "remove_half")]
    remove_half: bool,
}

fn main() {
    let args = Args::parse();

    let mut map: HashMap<u64, String, RandomState> =
        HashMap::with_capacity_and_hasher(args.initial_capacity, RandomState::new());
    println!(
        "Created HashMap with {} buckets (requested {})",
        map.capacity(),
        args.initial_capacity
    );

    let mut resizes = 0;
    for i in 0..args.entries as u64 {
        let before = map.capacity();
        map.insert(i, format!("Value{i}"));
        if map.capacity() != before {
            resizes += 1;
            println!(
                "  resize #{resizes}: {before} -> {} buckets at {} entries",
                map.capacity(),
                map.len()
            );
        }
    }
    map.insert_absent("absent".to_string());

    if args.remove_half {
        for i in (0..args.entries as u64).step_by(2) {
            map.remove(&i);
        }
        println!("Removed every other entry, {} remain", map.len());
    }

    println!("Inserted {} entries", map.len());
    map.debug_stats().print();

    println!("Chain length histogram:");
    let histogram = map.chain_histogram();
    let last = histogram.len() - 1;
    for (length, buckets) in histogram.iter().enumerate() {
        let label = if length == last {
            format!("{length}+")
        } else {
            length.to_string()
        };
        println!("  {label:>3}: {buckets}");
    }
}
