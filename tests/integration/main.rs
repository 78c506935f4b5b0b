mod service_flow;
