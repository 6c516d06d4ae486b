mod properties;
mod storage_errors;
