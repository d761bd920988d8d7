mod file_task;
mod job;
