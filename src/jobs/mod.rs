pub mod purge_sweeper;
