
mod admin_test;
mod delivery_test;
mod notify_test;
mod sweep_test;
mod worker_test;
