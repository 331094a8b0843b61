//! Runs the built-in example pipelines against the bundled data files
//! and prints the first few result rows.

use clap::{Parser, ValueEnum};

use std::path::{Path, PathBuf};

use rowflow::adapters::jsonl::{from_file, json_row};
use rowflow::{
    Graph, RowStream, Sources, inverted_index_graph, pmi_graph, route_speed_graph,
    word_count_graph,
};

#[derive(Parser)]
#[command(about = "run the built-in example pipelines")]
struct Args {
    /// Which pipeline to run.
    #[arg(long, value_enum)]
    experiment: Experiment,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Experiment {
    /// Word count over the text corpus.
    Count,
    /// TF-IDF inverted index over the text corpus.
    Idf,
    /// Pointwise mutual information over the text corpus.
    Pmi,
    /// Average route speed per weekday and hour.
    Maps,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    match args.experiment {
        Experiment::Count => {
            let graph = word_count_graph("docs", "text", "count");
            let sources = Sources::new().factory("docs", file_source("text_corpus.txt"));
            print_head(&graph, sources)?;
        }
        Experiment::Idf => {
            let graph = inverted_index_graph("texts", "doc_id", "text", "tf_idf");
            let sources = Sources::new().factory("texts", file_source("text_corpus.txt"));
            print_head(&graph, sources)?;
        }
        Experiment::Pmi => {
            let graph = pmi_graph("texts", "doc_id", "text", "pmi");
            let sources = Sources::new().factory("texts", file_source("text_corpus.txt"));
            print_head(&graph, sources)?;
        }
        Experiment::Maps => {
            let graph = route_speed_graph(
                "travel_time",
                "edge_length",
                "enter_time",
                "leave_time",
                "edge_id",
                "start",
                "end",
                "weekday",
                "hour",
                "speed",
            );
            let sources = Sources::new()
                .factory("travel_time", file_source("travel_times.txt"))
                .factory("edge_length", file_source("road_graph_data.txt"));
            print_head(&graph, sources)?;
        }
    }
    println!("experiment successfully finished");
    Ok(())
}

/// Stream the first five result rows without materialising the rest.
fn print_head(graph: &Graph, mut sources: Sources) -> anyhow::Result<()> {
    for row in graph.run_iter(&mut sources)?.take(5) {
        println!("{}", serde_json::to_string(&row?)?);
    }
    Ok(())
}

/// A restartable factory over one bundled data file.  Graphs that read
/// a source from several places (or are run twice) reopen it through
/// this closure.
fn file_source(name: &str) -> impl FnMut() -> RowStream {
    let path = data_file(name);
    move || match from_file(&path, json_row) {
        Ok(stream) => stream,
        Err(e) => Box::new(std::iter::once(Err(e))),
    }
}

fn data_file(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("examples/experiments/data")
        .join(name)
}
