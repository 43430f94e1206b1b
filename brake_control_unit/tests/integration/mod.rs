mod auto_load;
mod deadman;
mod fixtures;
mod limits;
mod persistence;
mod terminal;
