use eddy_observability::Counter;

pub struct IngestMetrics {
    pub messages_consumed: Counter<u64>,
    pub messages_dropped: Counter<u64>,
    pub records_written: Counter<u64>,
    pub batches_flushed: Counter<u64>,
    pub write_retries: Counter<u64>,
}

impl Default for IngestMetrics {
    fn default() -> Self {
        let meter = eddy_observability::meter("ingest");
        Self {
            messages_consumed: meter
                .u64_counter("ingest.messages.consumed")
                .with_unit("{message}")
                .with_description("messages received from the broker")
                .build(),
            messages_dropped: meter
                .u64_counter("ingest.messages.dropped")
                .with_unit("{message}")
                .with_description("malformed messages dropped by the normalizer")
                .build(),
            records_written: meter
                .u64_counter("ingest.records.written")
                .with_unit("{record}")
                .with_description("records appended to the table")
                .build(),
            batches_flushed: meter
                .u64_counter("ingest.batches.flushed")
                .with_unit("{batch}")
                .with_description("batches appended to the table")
                .build(),
            write_retries: meter
                .u64_counter("ingest.write.retries")
                .with_unit("{retry}")
                .with_description("failed table appends that were retried")
                .build(),
        }
    }
}
