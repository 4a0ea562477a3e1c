mod stream_spec;
