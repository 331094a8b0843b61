//! The built-in example pipelines: word count, TF-IDF, pointwise
//! mutual information and route speed aggregation.  Thin compositions
//! of the shipped operators; the `experiments` example binary runs
//! them against bundled data.

use crate::graph::Graph;
use crate::mappers::{
    Filter, FilterPunctuation, Idf, LowerCase, Pmi, ProcessLength, ProcessSpeed, ProcessTime,
    Product, Project, Split,
};
use crate::operators::Joiner;
use crate::reducers::{Count, FirstReducer, Sum, TermFrequency, TopN};

fn split_words(input: &str, text_column: &str) -> Graph {
    Graph::from_source(input)
        .map(FilterPunctuation::new(text_column))
        .map(LowerCase::new(text_column))
        .map(Split::new(text_column))
}

/// Count occurrences of each word across all documents, least
/// frequent first.
pub fn word_count_graph(input: &str, text_column: &str, count_column: &str) -> Graph {
    split_words(input, text_column)
        .sort(&[text_column])
        .reduce(Count::new(count_column), &[text_column])
        .sort(&[count_column, text_column])
}

/// TF-IDF inverted index: for every word, the top three documents by
/// `tf * idf`.
pub fn inverted_index_graph(
    input: &str,
    doc_column: &str,
    text_column: &str,
    result_column: &str,
) -> Graph {
    let words = split_words(input, text_column);
    // one row: the total number of documents
    let doc_count = Graph::from_source(input).reduce(Count::new("doc_count"), &[]);
    // per word, the number of documents containing it
    let word_docs = words
        .sort(&[doc_column, text_column])
        .reduce(FirstReducer, &[doc_column, text_column])
        .sort(&[text_column])
        .reduce(Count::new("word_docs"), &[text_column]);
    // broadcast the document total onto every word via the empty key
    let idf = word_docs
        .join(Joiner::inner(), &doc_count, &[])
        .map(Idf::new("doc_count", "word_docs", text_column, "idf"));
    let tf = words
        .sort(&[doc_column])
        .reduce(TermFrequency::new(text_column), &[doc_column]);
    tf.sort(&[text_column])
        .join(Joiner::inner(), &idf.sort(&[text_column]), &[text_column])
        .map(Product::new(&["tf", "idf"], result_column))
        .map(Project::new(&[doc_column, text_column, result_column]))
        .reduce(TopN::new(result_column, 3), &[text_column])
}

/// Pointwise mutual information: for every document, the top ten
/// words most specific to it.  Only words longer than four characters
/// occurring at least twice in the document participate.
pub fn pmi_graph(
    input: &str,
    doc_column: &str,
    text_column: &str,
    result_column: &str,
) -> Graph {
    let text = text_column.to_string();
    let words = split_words(input, text_column).map(Filter::new(move |row| {
        row.str_field(&text)
            .map(|word| word.chars().count() > 4)
            .unwrap_or(false)
    }));
    let frequent = words
        .sort(&[doc_column, text_column])
        .reduce(Count::new("occurrences"), &[doc_column, text_column])
        .map(Filter::new(|row| {
            row.int_field("occurrences").unwrap_or(0) >= 2
        }))
        .map(Project::new(&[doc_column, text_column]));
    // every word occurrence of a (doc, word) pair that passed the bar
    let relevant = words
        .sort(&[doc_column, text_column])
        .join(Joiner::inner(), &frequent, &[doc_column, text_column]);
    let tf_doc = relevant
        .reduce(TermFrequency::new(text_column), &[doc_column]);
    let tf_total = relevant.reduce(
        TermFrequency::new(text_column).with_result_column("tf_total"),
        &[],
    );
    tf_doc
        .sort(&[text_column])
        .join(Joiner::inner(), &tf_total, &[text_column])
        .map(Pmi::new("tf", "tf_total", result_column))
        .map(Project::new(&[doc_column, text_column, result_column]))
        .sort(&[doc_column])
        .reduce(TopN::new(result_column, 10), &[doc_column])
}

/// Average traffic speed per weekday and hour from edge geometry and
/// travel times.
#[allow(clippy::too_many_arguments)]
pub fn route_speed_graph(
    time_input: &str,
    length_input: &str,
    enter_time_column: &str,
    leave_time_column: &str,
    edge_id_column: &str,
    start_coord_column: &str,
    end_coord_column: &str,
    weekday_result_column: &str,
    hour_result_column: &str,
    speed_result_column: &str,
) -> Graph {
    let lengths = Graph::from_source(length_input)
        .map(ProcessLength::new(
            start_coord_column,
            end_coord_column,
            "length",
        ))
        .map(Project::new(&[edge_id_column, "length"]))
        .sort(&[edge_id_column])
        .reduce(FirstReducer, &[edge_id_column]);
    let times = Graph::from_source(time_input)
        .map(ProcessTime::new(
            enter_time_column,
            leave_time_column,
            "duration",
            weekday_result_column,
            hour_result_column,
        ))
        .sort(&[edge_id_column]);
    times
        .join(Joiner::inner(), &lengths, &[edge_id_column])
        .map(Project::new(&[
            weekday_result_column,
            hour_result_column,
            "length",
            "duration",
        ]))
        .sort(&[weekday_result_column, hour_result_column])
        .reduce(
            Sum::new(&["length", "duration"]),
            &[weekday_result_column, hour_result_column],
        )
        .map(ProcessSpeed::new("length", "duration", speed_result_column))
        .map(Project::new(&[
            weekday_result_column,
            hour_result_column,
            speed_result_column,
        ]))
}
