pub(crate) mod helper;
