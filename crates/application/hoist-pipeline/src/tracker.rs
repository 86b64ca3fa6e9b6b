use hoist_core::UploadPlan;
use hoist_store::UploadEvent;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ActiveUpload {
    pub id: u64,
    pub file_name: String,
    pub key: String,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct TransferSnapshot {
    pub total_files: u64,
    pub uploaded_files: u64,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub speed_bps: u64,
    pub failed_count: u64,
    pub in_flight: Vec<ActiveUpload>,
}

pub struct ProgressTracker {
    id_map: HashMap<u64, String>, // ID -> destination key
    in_flight: HashMap<u64, ActiveUpload>,
    uploaded_files: u64,
    failed_count: u64,
    current_uploaded_bytes: u64,
    total_files: u64,
    total_bytes: u64,
    last_tick: Instant,
    bytes_since_last_tick: u64,
    speed_bps: u64,
    history: VecDeque<u64>,
}

impl ProgressTracker {
    pub fn new(plan: &UploadPlan) -> Self {
        let mut id_map = HashMap::new();
        let mut total_bytes = 0;

        for (idx, action) in plan.uploads.iter().enumerate() {
            id_map.insert(idx as u64, action.key.clone());
            total_bytes += action.size;
        }

        Self {
            id_map,
            in_flight: HashMap::new(),
            uploaded_files: 0,
            failed_count: 0,
            current_uploaded_bytes: 0,
            total_files: plan.uploads.len() as u64,
            total_bytes,
            last_tick: Instant::now(),
            bytes_since_last_tick: 0,
            speed_bps: 0,
            history: VecDeque::new(),
        }
    }

    pub fn update(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Started { id, total_bytes } => {
                if let Some(key) = self.id_map.get(&id) {
                    let file_name = key.rsplit('/').next().unwrap_or_default().to_string();
                    self.in_flight.insert(
                        id,
                        ActiveUpload {
                            id,
                            file_name,
                            key: key.clone(),
                            bytes_uploaded: 0,
                            total_bytes,
                        },
                    );
                }
            }
            UploadEvent::Progress { id, bytes_delta } => {
                self.bytes_since_last_tick += bytes_delta;
                self.current_uploaded_bytes += bytes_delta;
                if let Some(entry) = self.in_flight.get_mut(&id) {
                    entry.bytes_uploaded += bytes_delta;
                }
            }
            UploadEvent::Completed { id, success } => {
                self.in_flight.remove(&id);
                if success {
                    self.uploaded_files += 1;
                } else {
                    self.failed_count += 1;
                }
            }
        }
    }

    pub fn get_snapshot(&mut self) -> TransferSnapshot {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();

        if elapsed >= 0.5 {
            let current_bps = (self.bytes_since_last_tick as f64 / elapsed) as u64;
            self.history.push_back(current_bps);
            if self.history.len() > 5 {
                self.history.pop_front();
            }
            self.speed_bps =
                (self.history.iter().sum::<u64>() as f64 / self.history.len() as f64) as u64;
            self.last_tick = now;
            self.bytes_since_last_tick = 0;
        }

        TransferSnapshot {
            total_files: self.total_files,
            uploaded_files: self.uploaded_files,
            total_bytes: self.total_bytes,
            uploaded_bytes: self.current_uploaded_bytes,
            speed_bps: self.speed_bps,
            failed_count: self.failed_count,
            in_flight: self.in_flight.values().cloned().collect(),
        }
    }
}
