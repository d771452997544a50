mod test_client;
mod test_http;
