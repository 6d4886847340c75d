pub mod auth;

#[cfg(test)]
mod test_utils;
