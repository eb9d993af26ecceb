pub mod raw_counts;
